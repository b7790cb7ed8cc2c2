use crate::error::Result;
use crate::scanner::is_relevant_path;
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Starts a recursive watch on `root` and forwards relevant changed paths.
///
/// The watch stops when the returned watcher is dropped.
pub fn spawn_watcher(root: &Path, tx: mpsc::UnboundedSender<PathBuf>) -> Result<RecommendedWatcher> {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let filter_root = root.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_relevant_kind(&event.kind) {
                    return;
                }
                for path in event.paths {
                    if is_relevant_path(&filter_root, &path) {
                        let _ = tx.send(path);
                    }
                }
            }
            Err(err) => tracing::warn!("Watch error: {}", err),
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!("Started watching {}", root.display());
    Ok(watcher)
}

fn is_relevant_kind(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Collects paths until none arrive for one full `interval`, then hands the
/// batch to `on_quiet`. Every new path restarts the timer.
///
/// `interval` is re-read on every wait so configuration changes apply to the
/// next quiet period.
pub async fn debounce<I, F, Fut>(
    mut events: mpsc::UnboundedReceiver<PathBuf>,
    interval: I,
    cancel: CancellationToken,
    mut on_quiet: F,
) where
    I: Fn() -> Duration,
    F: FnMut(Vec<PathBuf>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut pending: HashSet<PathBuf> = HashSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            }
            event = events.recv() => {
                match event {
                    Some(path) => {
                        pending.insert(path);
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(interval()), if !pending.is_empty() => {
                let mut paths: Vec<PathBuf> = pending.drain().collect();
                paths.sort();
                on_quiet(paths).await;
            }
        }
    }
    tracing::debug!("Debounce loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_relevant_kinds() {
        assert!(is_relevant_kind(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(!is_relevant_kind(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::WriteTime
        ))));
        assert!(!is_relevant_kind(&EventKind::Access(AccessKind::Read)));
    }

    fn spawn_counter(
        interval: Duration,
    ) -> (
        mpsc::UnboundedSender<PathBuf>,
        Arc<AtomicUsize>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let handle = {
            let calls = calls.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                debounce(rx, move || interval, cancel, |_paths| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {}
                })
                .await;
            })
        };
        (tx, calls, cancel, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_call() {
        let (tx, calls, cancel, handle) = spawn_counter(Duration::from_millis(200));

        tx.send(PathBuf::from("a.go")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(PathBuf::from("a.go")).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_fire_separately() {
        let (tx, calls, cancel, handle) = spawn_counter(Duration::from_millis(200));

        tx.send(PathBuf::from("a.go")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(PathBuf::from("b.go")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cancel.cancel();
        handle.await.unwrap();
    }
}

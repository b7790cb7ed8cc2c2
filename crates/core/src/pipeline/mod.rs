//! Live synchronization: cached model, debounced re-extraction, diff-gated
//! broadcast and observer edits.

pub mod edit;
pub mod hub;
pub mod watch;

pub use hub::{ClientId, Hub};

use crate::aggregate::{Extraction, extract_tree};
use crate::config::Settings;
use crate::error::{Result, StructscopeError};
use crate::fingerprint::Fingerprint;
use crate::registry::ParsedRegistry;
use crate::scanner;
use notify::RecommendedWatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use structscope_api::{EditOutcome, Model, Outbound};
use structscope_go::GoParser;
use tokio::sync::{Mutex, mpsc, watch as settings_watch};
use tokio_util::sync::CancellationToken;

/// Cached model plus what it was built from.
struct CacheState {
    root: PathBuf,
    last_modified: Option<SystemTime>,
    model: Option<Arc<Model>>,
    fingerprint: Option<Fingerprint>,
}

impl CacheState {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            last_modified: None,
            model: None,
            fingerprint: None,
        }
    }
}

pub struct Pipeline {
    parser: GoParser,
    settings: settings_watch::Receiver<Settings>,

    /// Guards the freshness check and the re-extraction together.
    cache: Mutex<CacheState>,
    registry: ParsedRegistry,
    hub: Arc<Hub>,

    events_tx: mpsc::UnboundedSender<PathBuf>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<PathBuf>>>,
    watcher: Mutex<Option<RecommendedWatcher>>,

    extractions: AtomicU64,
    cancel_token: CancellationToken,
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl Pipeline {
    pub fn new(settings: settings_watch::Receiver<Settings>) -> Result<Arc<Self>> {
        let parser = GoParser::new()?;
        let root = settings.borrow().watched_root.clone();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Arc::new(Self {
            parser,
            settings,
            cache: Mutex::new(CacheState::new(root)),
            registry: ParsedRegistry::new(),
            hub: Arc::new(Hub::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            watcher: Mutex::new(None),
            extractions: AtomicU64::new(0),
            cancel_token: CancellationToken::new(),
        }))
    }

    /// A pipeline with fixed settings.
    pub fn with_settings(settings: Settings) -> Result<Arc<Self>> {
        let (_tx, rx) = settings_watch::channel(settings);
        Self::new(rx)
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn registry(&self) -> &ParsedRegistry {
        &self.registry
    }

    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Number of extraction passes run so far.
    pub fn extraction_count(&self) -> u64 {
        self.extractions.load(Ordering::Relaxed)
    }

    /// Feeds changed paths into the debounce loop, as the file watcher does.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<PathBuf> {
        self.events_tx.clone()
    }

    pub async fn root(&self) -> PathBuf {
        self.cache.lock().await.root.clone()
    }

    /// Arms the file watcher, starts the debounce and settings tasks and
    /// loads the initial model.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let events_rx = self
            .events_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| StructscopeError::Internal("pipeline already started".to_string()))?;

        let root = self.root().await;
        self.watch_root(&root).await?;
        self.spawn_debounce(events_rx);
        self.spawn_settings_listener();

        if let Err(err) = self.refresh().await {
            tracing::error!("Initial extraction of {} failed: {}", root.display(), err);
        }
        Ok(())
    }

    /// Replaces the file watcher with one on `root`.
    pub async fn watch_root(&self, root: &Path) -> Result<()> {
        let mut slot = self.watcher.lock().await;
        // Stop the old watch first so its events cannot leak into the new root.
        *slot = None;
        *slot = Some(watch::spawn_watcher(root, self.events_tx.clone())?);
        Ok(())
    }

    fn spawn_debounce(self: &Arc<Self>, events_rx: mpsc::UnboundedReceiver<PathBuf>) {
        let pipeline_weak = Arc::downgrade(self);
        let settings = self.settings.clone();
        let cancel = self.cancel_token.clone();

        tokio::spawn(async move {
            watch::debounce(
                events_rx,
                move || settings.borrow().debounce_interval,
                cancel,
                |paths| {
                    let pipeline_weak = pipeline_weak.clone();
                    async move {
                        let Some(pipeline) = pipeline_weak.upgrade() else {
                            return;
                        };
                        tracing::info!("Detected changes in {} paths. Updating...", paths.len());
                        if let Err(err) = pipeline.refresh().await {
                            tracing::error!("Extraction failed, keeping previous model: {}", err);
                        }
                    }
                },
            )
            .await;
        });
    }

    fn spawn_settings_listener(self: &Arc<Self>) {
        let pipeline_weak = Arc::downgrade(self);
        let mut settings = self.settings.clone();
        let cancel = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = settings.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let root = settings.borrow_and_update().watched_root.clone();
                        let Some(pipeline) = pipeline_weak.upgrade() else {
                            break;
                        };
                        if pipeline.root().await != root {
                            pipeline.reset_root(root).await;
                        }
                    }
                }
            }
            tracing::debug!("Settings listener ended");
        });
    }

    /// The cached model, re-extracted first if any Go file changed since it
    /// was built.
    pub async fn request_current_model(&self) -> Result<Arc<Model>> {
        let mut cache = self.cache.lock().await;
        self.current_locked(&mut cache).await
    }

    /// Sends the current model to one observer.
    ///
    /// Runs under the cache lock so no broadcast can overtake it.
    pub async fn send_current_model(&self, id: ClientId) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let model = self.current_locked(&mut cache).await?;
        self.hub.send_to(id, Outbound::Model(model));
        Ok(())
    }

    async fn current_locked(&self, cache: &mut CacheState) -> Result<Arc<Model>> {
        let root = cache.root.clone();
        let latest = tokio::task::spawn_blocking(move || scanner::latest_mod_time(&root))
            .await
            .map_err(|e| StructscopeError::Internal(e.to_string()))??;

        if let Some(model) = &cache.model {
            if cache.last_modified == latest {
                return Ok(model.clone());
            }
        }

        tracing::debug!("Cached model is stale, re-extracting");
        self.rebuild_locked(cache).await?;
        cache
            .model
            .clone()
            .ok_or_else(|| StructscopeError::Internal("model missing after extraction".to_string()))
    }

    /// Re-extracts and broadcasts if the result differs from the cached model.
    ///
    /// Returns whether a broadcast happened. On error the previous model
    /// stays in place.
    pub async fn refresh(&self) -> Result<bool> {
        let mut cache = self.cache.lock().await;
        self.rebuild_locked(&mut cache).await
    }

    async fn rebuild_locked(&self, cache: &mut CacheState) -> Result<bool> {
        let (extraction, latest) = self.extract(cache.root.clone()).await?;
        let Extraction { model, trees } = extraction;

        self.registry.replace(trees).await;

        let fingerprint = Fingerprint::of(&model);
        let changed = cache.fingerprint != Some(fingerprint);
        let model = Arc::new(model);
        cache.model = Some(model.clone());
        cache.fingerprint = Some(fingerprint);
        cache.last_modified = latest;

        if changed {
            tracing::info!(
                "Model updated: {} packages, {} structs, {} edges",
                model.packages.len(),
                model.struct_count(),
                model.edges.len()
            );
            self.hub.publish(Outbound::clear());
            self.hub.publish(Outbound::Model(model));
        } else {
            tracing::debug!("Model unchanged, broadcast suppressed");
        }
        Ok(changed)
    }

    async fn extract(&self, root: PathBuf) -> Result<(Extraction, Option<SystemTime>)> {
        self.extractions.fetch_add(1, Ordering::Relaxed);
        let parser = self.parser.clone();
        tokio::task::spawn_blocking(move || {
            // Timestamp first: a write during extraction leaves the cache stale.
            let latest = scanner::latest_mod_time(&root)?;
            let extraction = extract_tree(&parser, &root)?;
            Ok((extraction, latest))
        })
        .await
        .map_err(|e| StructscopeError::Internal(e.to_string()))?
    }

    /// Switches to a new watched root: drops the cache and registry, tells
    /// observers to clear, re-arms the watcher and publishes a fresh model.
    pub async fn reset_root(&self, root: PathBuf) {
        tracing::info!("Watched root changed to {}", root.display());
        let mut cache = self.cache.lock().await;
        *cache = CacheState::new(root.clone());
        self.registry.clear().await;

        if let Err(err) = self.watch_root(&root).await {
            tracing::error!("Cannot watch {}: {}", root.display(), err);
        }
        if let Err(err) = self.rebuild_locked(&mut cache).await {
            tracing::error!("Extraction of {} failed: {}", root.display(), err);
            self.hub.publish(Outbound::clear());
        }
    }

    /// Writes an observer's edited model back to the source files.
    ///
    /// Holds the registry exclusively for the whole batch. The resulting file
    /// changes reach observers through the watcher like any other edit.
    pub async fn submit_edited_model(&self, edited: Model) -> Vec<EditOutcome> {
        let submitted: Vec<(String, String)> = edited
            .packages
            .iter()
            .flat_map(|p| p.files.iter().map(move |f| (p.name.clone(), f.name.clone())))
            .collect();

        let mut trees = self.registry.write_owned().await;
        let parser = self.parser.clone();
        let policy = self.settings.borrow().edit_batch;

        let result = tokio::task::spawn_blocking(move || {
            edit::apply_edits(&parser, &mut trees, &edited, policy)
        })
        .await;

        match result {
            Ok(outcomes) => outcomes,
            Err(err) => {
                tracing::error!("Edit task failed: {}", err);
                submitted
                    .into_iter()
                    .map(|(package, file)| EditOutcome::failed(package, file, err.to_string()))
                    .collect()
            }
        }
    }

    /// Cancels background tasks and disconnects every observer.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
        self.hub.close_all();
    }
}

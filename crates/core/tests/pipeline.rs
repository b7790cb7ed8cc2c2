use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use structscope_api::{Field, Method, Model, Outbound, TypeRef};
use structscope_core::{EditBatch, Fingerprint, Pipeline, Settings};
use tempfile::{TempDir, tempdir};
use tokio::sync::{mpsc, watch};

fn write(root: &Path, rel: &str, source: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, source).unwrap();
    path
}

fn settings(root: &Path) -> Settings {
    Settings::for_root(root)
}

fn project() -> TempDir {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "main.go",
        "package main\n\nimport \"fmt\"\n\ntype A struct {\n\tb B\n}\n\ntype B struct {\n\tx int\n}\n\nfunc (a *A) Run() error {\n\tfmt.Println(a.b.x)\n\treturn nil\n}\n",
    );
    write(dir.path(), "util.go", "package main\n\ntype Helper struct{}\n");
    dir
}

async fn next_model(rx: &mut mpsc::Receiver<Outbound>) -> Arc<Model> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a model")
            .expect("observer queue closed");
        if let Outbound::Model(model) = msg {
            return model;
        }
    }
}

#[tokio::test]
async fn test_request_current_model_caches_until_files_change() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();

    let first = pipeline.request_current_model().await.unwrap();
    let again = pipeline.request_current_model().await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(pipeline.extraction_count(), 1);

    // Make sure the new mtime is observably later.
    tokio::time::sleep(Duration::from_millis(20)).await;
    write(dir.path(), "extra.go", "package main\n\ntype Extra struct{}\n");
    let fresh = pipeline.request_current_model().await.unwrap();
    assert_eq!(pipeline.extraction_count(), 2);
    assert!(fresh.find_struct("main", "Extra").is_some());
}

#[tokio::test]
async fn test_quick_successive_changes_extract_once() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    pipeline.start().await.unwrap();
    let after_start = pipeline.extraction_count();

    let events = pipeline.event_sender();
    events.send(dir.path().join("main.go")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    events.send(dir.path().join("main.go")).unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(pipeline.extraction_count(), after_start + 1);
    pipeline.shutdown();
}

#[tokio::test]
async fn test_unchanged_extraction_is_not_broadcast() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    let (_, mut rx) = pipeline.hub().register(16);

    assert!(pipeline.refresh().await.unwrap());
    assert!(matches!(rx.recv().await, Some(Outbound::Clear { .. })));
    assert!(matches!(rx.recv().await, Some(Outbound::Model(_))));

    assert!(!pipeline.refresh().await.unwrap());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_parse_error_keeps_previous_model() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    let before = pipeline.request_current_model().await.unwrap();

    write(dir.path(), "util.go", "package main\n\ntype Helper struct {\n");
    assert!(pipeline.refresh().await.is_err());

    let registry = pipeline.registry().read().await;
    assert_eq!(registry.file_count(), 2);
    drop(registry);
    assert_eq!(before.struct_count(), 3);
}

#[tokio::test]
async fn test_slow_observer_is_dropped() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    let (slow, _slow_rx) = pipeline.hub().register(1);
    let (fast, mut fast_rx) = pipeline.hub().register(16);

    pipeline.refresh().await.unwrap();
    assert!(!pipeline.hub().contains(slow));
    assert!(pipeline.hub().contains(fast));
    assert!(matches!(fast_rx.recv().await, Some(Outbound::Clear { .. })));
    assert!(matches!(fast_rx.recv().await, Some(Outbound::Model(_))));
}

#[tokio::test]
async fn test_watcher_broadcasts_new_struct() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    pipeline.start().await.unwrap();
    let (_, mut rx) = pipeline.hub().register(16);

    write(dir.path(), "pkg/new.go", "package pkg\n\ntype Fresh struct{}\n");

    let model = next_model(&mut rx).await;
    assert!(model.find_struct("pkg", "Fresh").is_some());
    pipeline.shutdown();
}

#[tokio::test]
async fn test_unchanged_model_round_trips() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    let model = pipeline.request_current_model().await.unwrap();

    let outcomes = pipeline.submit_edited_model((*model).clone()).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.ok), "{:?}", outcomes);

    pipeline.refresh().await.unwrap();
    let after = pipeline.request_current_model().await.unwrap();
    assert_eq!(Fingerprint::of(&model), Fingerprint::of(&after));
}

#[tokio::test]
async fn test_edit_adds_field_and_method_stub() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    let mut model = (*pipeline.request_current_model().await.unwrap()).clone();

    let main_go = dir.path().join("main.go").to_string_lossy().to_string();
    model.packages[0].files.retain(|f| f.name == main_go);
    let b = model.packages[0].files[0]
        .structs
        .iter_mut()
        .find(|s| s.name == "B")
        .unwrap();
    b.fields.push(Field::new("label", TypeRef::literal("string")));
    b.methods.push(Method {
        name: "Label".into(),
        return_types: vec![TypeRef::literal("string")],
    });

    let outcomes = pipeline.submit_edited_model(model).await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].ok, "{:?}", outcomes[0]);

    let text = fs::read_to_string(&main_go).unwrap();
    assert!(text.contains("\tlabel string\n"));
    assert!(text.contains("func (s *B) Label() string {\n}"));
    // Existing method bodies survive.
    assert!(text.contains("fmt.Println(a.b.x)"));

    pipeline.refresh().await.unwrap();
    let after = pipeline.request_current_model().await.unwrap();
    let b = after.find_struct("main", "B").unwrap().1;
    assert!(b.field("label").is_some());
    assert!(b.method("Label").is_some());
}

#[tokio::test]
async fn test_invalid_type_literal_leaves_file_untouched() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    let mut model = (*pipeline.request_current_model().await.unwrap()).clone();
    let main_go = dir.path().join("main.go");
    let before = fs::read_to_string(&main_go).unwrap();

    for file in &mut model.packages[0].files {
        for st in &mut file.structs {
            if st.name == "B" {
                st.fields[0].type_ref.literal = "chan<>".into();
            }
        }
    }

    let outcomes = pipeline.submit_edited_model(model).await;
    let main_name = main_go.to_string_lossy().to_string();
    let main = outcomes.iter().find(|o| o.file == main_name).unwrap();
    assert!(!main.ok);
    assert!(main.error.as_deref().unwrap().contains("chan<>"));
    // Independent policy: the other file is still accepted.
    assert!(outcomes.iter().filter(|o| o.file != main_name).all(|o| o.ok));
    assert_eq!(fs::read_to_string(&main_go).unwrap(), before);
}

#[tokio::test]
async fn test_atomic_batch_writes_nothing_on_failure() {
    let dir = project();
    let mut settings = settings(dir.path());
    settings.edit_batch = EditBatch::Atomic;
    let pipeline = Pipeline::with_settings(settings).unwrap();
    let mut model = (*pipeline.request_current_model().await.unwrap()).clone();
    let util_go = dir.path().join("util.go");
    let util_before = fs::read_to_string(&util_go).unwrap();

    for file in &mut model.packages[0].files {
        for st in &mut file.structs {
            match st.name.as_str() {
                "Helper" => st.fields.push(Field::new("n", TypeRef::literal("int"))),
                "B" => st.fields[0].type_ref.literal = "map[".into(),
                _ => {}
            }
        }
    }

    let outcomes = pipeline.submit_edited_model(model).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| !o.ok));
    assert_eq!(fs::read_to_string(&util_go).unwrap(), util_before);
}

#[tokio::test]
async fn test_unknown_file_is_reported() {
    let dir = project();
    let pipeline = Pipeline::with_settings(settings(dir.path())).unwrap();
    pipeline.request_current_model().await.unwrap();

    let mut model = Model::empty();
    model.packages.push(structscope_api::Package {
        name: "main".into(),
        files: vec![structscope_api::File {
            name: "nowhere.go".into(),
            structs: Vec::new(),
        }],
    });

    let outcomes = pipeline.submit_edited_model(model).await;
    assert!(!outcomes[0].ok);
    assert!(outcomes[0].error.as_deref().unwrap().contains("unknown file"));
}

#[tokio::test]
async fn test_reset_root_clears_and_republishes() {
    let first = project();
    let second = tempdir().unwrap();
    write(second.path(), "other.go", "package other\n\ntype Other struct{}\n");

    let pipeline = Pipeline::with_settings(settings(first.path())).unwrap();
    pipeline.request_current_model().await.unwrap();
    let (_, mut rx) = pipeline.hub().register(16);

    pipeline.reset_root(second.path().to_path_buf()).await;

    assert!(matches!(rx.recv().await, Some(Outbound::Clear { .. })));
    let model = next_model(&mut rx).await;
    assert!(model.find_struct("other", "Other").is_some());
    assert!(model.find_package("main").is_none());
    assert_eq!(pipeline.root().await, second.path());
    pipeline.shutdown();
}

#[tokio::test]
async fn test_settings_change_of_root_resets_pipeline() {
    let first = project();
    let second = tempdir().unwrap();
    write(second.path(), "other.go", "package other\n\ntype Other struct{}\n");

    let (settings_tx, settings_rx) = watch::channel(settings(first.path()));
    let pipeline = Pipeline::new(settings_rx).unwrap();
    pipeline.start().await.unwrap();
    let after_start = pipeline.extraction_count();
    let (_, mut rx) = pipeline.hub().register(16);

    // Only the interval changed: same root, nothing is re-extracted.
    let mut slower = settings(first.path());
    slower.debounce_interval = Duration::from_millis(300);
    settings_tx.send(slower).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(pipeline.extraction_count(), after_start);
    assert_eq!(pipeline.root().await, first.path());

    settings_tx.send(settings(second.path())).unwrap();

    let first_msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for clearLayout");
    assert!(matches!(first_msg, Some(Outbound::Clear { .. })));
    let model = next_model(&mut rx).await;
    assert!(model.find_struct("other", "Other").is_some());
    assert!(model.find_package("main").is_none());
    assert_eq!(pipeline.root().await, second.path());
    pipeline.shutdown();
}

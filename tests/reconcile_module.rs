use devprov::reconcile::{ConfigPatch, ConfigReconciler, KeyPath, ReconcileError};
use devprov::shared::fs_atomic::{file_mode, set_mode, FileOwner};
use serde_json::{json, Map, Value};
use std::fs;
use std::os::unix::fs::{symlink, MetadataExt};
use std::path::Path;

fn key(raw: &str) -> KeyPath {
    KeyPath::parse(raw).expect("key path")
}

fn model(id: &str, name: &str) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("id".to_string(), json!(id));
    entry.insert("name".to_string(), json!(name));
    entry
}

fn desired() -> ConfigPatch {
    ConfigPatch::new()
        .set(key("apiKey"), "or-key")
        .set(key("providers.anthropic.apiKey"), "an-key")
        .upsert(key("models"), "id", model("anthropic/claude-sonnet-4", "Claude Sonnet 4"))
        .upsert(key("models"), "id", model("openai/gpt-4o", "GPT-4o"))
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read config")).expect("parse config")
}

#[test]
fn reconcile_creates_a_missing_document_owner_only() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join(".config/devprov/llm.json");

    let changed = ConfigReconciler::new(None)
        .reconcile(&path, &desired())
        .expect("reconcile");

    assert!(changed);
    assert_eq!(file_mode(&path).expect("mode"), 0o600);
    assert_eq!(
        read_json(&path),
        json!({
            "apiKey": "or-key",
            "providers": { "anthropic": { "apiKey": "an-key" } },
            "models": [
                { "id": "anthropic/claude-sonnet-4", "name": "Claude Sonnet 4" },
                { "id": "openai/gpt-4o", "name": "GPT-4o" }
            ]
        })
    );
    assert!(fs::read_to_string(&path).expect("read").ends_with("}\n"));
}

#[test]
fn reconcile_preserves_unrelated_keys_and_merges_collection_entries() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("llm.json");
    fs::write(
        &path,
        serde_json::to_string(&json!({
            "theme": "dark",
            "providers": { "openai": { "apiKey": "kept" } },
            "models": [
                { "id": "local/llama", "name": "Llama" },
                { "id": "openai/gpt-4o", "name": "old name", "contextWindow": 128000 }
            ]
        }))
        .expect("render"),
    )
    .expect("seed config");

    assert!(ConfigReconciler::new(None)
        .reconcile(&path, &desired())
        .expect("reconcile"));

    assert_eq!(
        read_json(&path),
        json!({
            "theme": "dark",
            "providers": {
                "openai": { "apiKey": "kept" },
                "anthropic": { "apiKey": "an-key" }
            },
            "models": [
                { "id": "local/llama", "name": "Llama" },
                { "id": "openai/gpt-4o", "name": "GPT-4o", "contextWindow": 128000 },
                { "id": "anthropic/claude-sonnet-4", "name": "Claude Sonnet 4" }
            ],
            "apiKey": "or-key"
        })
    );
}

#[test]
fn second_reconcile_leaves_the_file_byte_identical() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("llm.json");
    let reconciler = ConfigReconciler::new(None);

    assert!(reconciler.reconcile(&path, &desired()).expect("first"));
    let first = fs::read(&path).expect("read first");
    assert!(!reconciler.reconcile(&path, &desired()).expect("second"));
    assert_eq!(fs::read(&path).expect("read second"), first);
}

#[test]
fn existing_file_mode_is_preserved_on_update() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("llm.json");
    fs::write(&path, "{}").expect("seed");
    set_mode(&path, 0o640).expect("chmod");

    assert!(ConfigReconciler::new(None)
        .reconcile(&path, &desired())
        .expect("reconcile"));
    assert_eq!(file_mode(&path).expect("mode"), 0o640);
}

#[test]
fn malformed_documents_are_reported_and_left_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let reconciler = ConfigReconciler::new(None);

    for (name, body) in [
        ("broken.json", "{ \"apiKey\": "),
        ("array.json", "[1, 2]"),
        ("shape.json", "{\"providers\": \"flat\"}"),
    ] {
        let path = temp.path().join(name);
        fs::write(&path, body).expect("seed");

        let err = reconciler
            .reconcile(&path, &desired())
            .expect_err("malformed document");
        assert!(
            matches!(err, ReconcileError::MalformedExistingDocument { .. }),
            "{name}: {err}"
        );
        assert_eq!(fs::read_to_string(&path).expect("read"), body, "{name}");
    }
}

#[test]
fn upsert_without_identifying_field_is_an_invalid_patch() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("llm.json");
    let mut element = Map::new();
    element.insert("name".to_string(), json!("nameless"));

    let err = ConfigReconciler::new(None)
        .reconcile(&path, &ConfigPatch::new().upsert(key("models"), "id", element))
        .expect_err("invalid patch");
    assert!(matches!(err, ReconcileError::InvalidPatch { .. }), "{err}");
    assert!(!path.exists());
}

#[test]
fn empty_patch_leaves_a_missing_document_absent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join(".config/devprov/llm.json");

    let changed = ConfigReconciler::new(None)
        .reconcile(&path, &ConfigPatch::new())
        .expect("reconcile");

    assert!(!changed);
    assert!(!path.exists());
    assert!(!temp.path().join(".config").exists());
}

#[test]
fn owned_reconcile_refuses_a_symlinked_document() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");
    fs::create_dir_all(&home).expect("mkdir home");
    let victim = temp.path().join("shadow.json");
    fs::write(&victim, "{\"root\": true}\n").expect("seed victim");
    set_mode(&victim, 0o640).expect("victim mode");
    let path = home.join("llm.json");
    symlink(&victim, &path).expect("symlink");
    let meta = fs::metadata(&home).expect("home metadata");
    let owner = FileOwner::new(meta.uid(), meta.gid(), &home);

    let err = ConfigReconciler::new(Some(owner))
        .reconcile(&path, &desired())
        .expect_err("symlinked document");

    assert!(matches!(err, ReconcileError::Read { .. }), "{err}");
    assert!(err.to_string().contains("refusing to follow symlink"), "{err}");
    assert_eq!(fs::read_to_string(&victim).expect("victim"), "{\"root\": true}\n");
    assert_eq!(file_mode(&victim).expect("victim mode"), 0o640);
    assert!(fs::symlink_metadata(&path).expect("link").file_type().is_symlink());
}

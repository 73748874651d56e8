use std::fs;

use parity_core::assets::{AssetProvider, LocalAssetStore, ResolvedAssets};
use parity_core::config::ModelSpec;
use parity_core::BackendKind;
use parity_spm::{detect_model_file, open_from_assets};

fn model(model_file: Option<&str>) -> ModelSpec {
    ModelSpec {
        id: "t5".to_string(),
        display_name: None,
        repo_id: Some("google/t5-small".to_string()),
        backend: BackendKind::SentencePiece,
        required_files: Vec::new(),
        optional_files: Vec::new(),
        model_file: model_file.map(str::to_string),
        chat_scenarios: None,
    }
}

fn assets_in(dir: &std::path::Path) -> ResolvedAssets {
    LocalAssetStore::new(dir)
        .resolve(&model(None))
        .expect("resolve")
}

#[test]
fn preferred_names_win_over_other_model_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_dir = dir.path().join("t5");
    fs::create_dir_all(&model_dir).expect("model dir");
    fs::write(model_dir.join("a.model"), b"x").expect("a");
    fs::write(model_dir.join("tokenizer.model"), b"x").expect("tokenizer");
    fs::write(model_dir.join("spiece.model"), b"x").expect("spiece");

    let found = detect_model_file(&assets_in(dir.path())).expect("found");
    assert_eq!(found.file_name().unwrap(), "spiece.model");

    fs::remove_file(model_dir.join("spiece.model")).expect("remove");
    let found = detect_model_file(&assets_in(dir.path())).expect("found");
    assert_eq!(found.file_name().unwrap(), "tokenizer.model");
}

#[test]
fn any_model_file_is_the_fallback_in_name_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_dir = dir.path().join("t5");
    fs::create_dir_all(&model_dir).expect("model dir");
    fs::write(model_dir.join("zz.model"), b"x").expect("zz");
    fs::write(model_dir.join("bb.model"), b"x").expect("bb");
    fs::write(model_dir.join("notes.txt"), b"x").expect("txt");

    let found = detect_model_file(&assets_in(dir.path())).expect("found");
    assert_eq!(found.file_name().unwrap(), "bb.model");
}

#[test]
fn no_model_file_is_asset_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("t5")).expect("model dir");
    let err = open_from_assets(&model(None), &assets_in(dir.path())).expect_err("missing");
    assert_eq!(err.kind(), "asset_missing");
}

#[test]
fn configured_model_file_must_exist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_dir = dir.path().join("t5");
    fs::create_dir_all(&model_dir).expect("model dir");
    fs::write(model_dir.join("spiece.model"), b"x").expect("spiece");
    let err = open_from_assets(&model(Some("other.model")), &assets_in(dir.path()))
        .expect_err("missing");
    assert_eq!(err.kind(), "asset_missing");
}

#[test]
fn unreadable_model_is_backend_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_dir = dir.path().join("t5");
    fs::create_dir_all(&model_dir).expect("model dir");
    fs::write(model_dir.join("spiece.model"), b"not a protobuf").expect("spiece");
    let err = open_from_assets(&model(None), &assets_in(dir.path())).expect_err("bad model");
    assert_eq!(err.kind(), "backend_unavailable");
}

use std::fs;
use std::path::Path;

use parity_core::manifest::{
    compare_snapshots, reconcile, CaseSnapshot, ManifestFile, ValidationManifest, DECODED_HASH,
    IDS_HASH, PAIR_TEXT_HASH, TEXT_HASH,
};
use parity_core::hash::hash_string;
use parity_core::ParityError;
use serde_json::{json, Value};

fn known() -> Vec<String> {
    vec!["py".to_string(), "tokenx".to_string()]
}

fn snapshot(case_id: &str, text: &str, ids_hash: &str) -> CaseSnapshot {
    let text_hash = hash_string(text);
    CaseSnapshot {
        case_id: case_id.to_string(),
        text_hash: text_hash.clone(),
        fields: vec![
            (TEXT_HASH, text_hash),
            (IDS_HASH, ids_hash.to_string()),
            (DECODED_HASH, hash_string(text)),
        ],
    }
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_vec_pretty(value).expect("encode")).expect("write");
}

#[test]
fn empty_manifest_gains_case_for_backend() {
    let mut manifest = ValidationManifest::empty("m");
    let report = reconcile(
        &mut manifest,
        Path::new("m.json"),
        "py",
        &[],
        &[snapshot("case-1", "hello", "ids")],
    )
    .expect("reconcile");

    assert_eq!(report.created, vec!["case-1"]);
    let value = serde_json::to_value(&manifest).expect("to value");
    assert_eq!(value["version"], 1);
    assert_eq!(value["model"], "m");
    let cases = value["cases"].as_object().expect("cases");
    assert_eq!(cases.len(), 1);
    let entry = cases["case-1"].as_object().expect("entry");
    assert_eq!(entry.keys().collect::<Vec<_>>(), vec!["py"]);
    assert_eq!(entry["py"][TEXT_HASH], hash_string("hello"));
    assert!(value.get("modelFile").is_none());
}

#[test]
fn new_entries_get_placeholders_for_known_backends() {
    let mut manifest = ValidationManifest::empty("m");
    reconcile(
        &mut manifest,
        Path::new("m.json"),
        "rs",
        &known(),
        &[snapshot("case-1", "hello", "ids")],
    )
    .expect("reconcile");
    let entry = &manifest.cases["case-1"];
    assert_eq!(entry.keys().collect::<Vec<_>>(), vec!["py", "tokenx", "rs"]);
    assert_eq!(entry["py"], json!({}));
    assert_eq!(entry["tokenx"], json!({}));
    assert_eq!(entry["rs"][IDS_HASH], "ids");
}

#[test]
fn reconcile_twice_is_clean_and_byte_stable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("gpt2").join("tokenx-tests-validation.json");
    let snaps = vec![
        snapshot("b-case", "world", "ids-b"),
        snapshot("a-case", "hello", "ids-a"),
    ];

    let mut first = ManifestFile::load_or_create(&path, "gpt2").expect("load");
    assert!(!first.existed());
    first.reconcile("py", &known(), &snaps).expect("reconcile");
    assert!(first.is_dirty());
    assert!(first.write_if_dirty().expect("write"));
    let bytes_1 = fs::read(&path).expect("read");
    assert_eq!(bytes_1.last(), Some(&b'\n'));

    let mut second = ManifestFile::load_or_create(&path, "gpt2").expect("reload");
    let report = second.reconcile("py", &known(), &snaps).expect("reconcile");
    assert!(!report.changed());
    assert_eq!(report.unchanged, 2);
    assert!(!second.is_dirty());
    assert!(!second.write_if_dirty().expect("no write"));
    assert_eq!(fs::read(&path).expect("read"), bytes_1);

    // Cases are written sorted by id regardless of processing order
    let text = String::from_utf8(bytes_1).expect("utf8");
    let a = text.find("\"a-case\"").expect("a-case");
    let b = text.find("\"b-case\"").expect("b-case");
    assert!(a < b);
    assert!(text.starts_with("{\n  \"version\": 1,\n  \"model\": \"gpt2\","));
}

#[test]
fn other_backend_fields_are_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("m.json");
    let tokenx = json!({
        "text-hash": hash_string("hello"),
        "ids-hash": "tokenx-ids",
        "custom": [1, 2, 3]
    });
    write_json(
        &path,
        &json!({
            "version": 1,
            "model": "m",
            "cases": {"case-1": {"tokenx": tokenx.clone(), "py": {}}}
        }),
    );

    let mut file = ManifestFile::load_or_create(&path, "m").expect("load");
    let report = file
        .reconcile("py", &known(), &[snapshot("case-1", "hello", "py-ids")])
        .expect("reconcile");
    assert_eq!(report.updated, vec!["case-1"]);
    assert_eq!(file.manifest.cases["case-1"]["tokenx"], tokenx);
    assert_eq!(file.manifest.cases["case-1"]["py"][IDS_HASH], "py-ids");
    // Entry order from disk is kept
    assert_eq!(
        file.manifest.cases["case-1"].keys().collect::<Vec<_>>(),
        vec!["tokenx", "py"]
    );
}

#[test]
fn fields_the_backend_does_not_compute_are_kept() {
    let mut manifest = ValidationManifest::empty("m");
    manifest.cases.insert(
        "case-1".to_string(),
        serde_json::from_value(json!({
            "py": {"text-hash": hash_string("hello"), "legacy-hash": "keep-me", "ids-hash": "old"}
        }))
        .expect("entry"),
    );
    reconcile(
        &mut manifest,
        Path::new("m.json"),
        "py",
        &known(),
        &[snapshot("case-1", "hello", "new")],
    )
    .expect("reconcile");
    let py = manifest.snapshot("case-1", "py").expect("py");
    assert_eq!(py["legacy-hash"], "keep-me");
    assert_eq!(py[IDS_HASH], "new");
}

#[test]
fn generator_fields_missing_from_a_fresh_snapshot_are_removed() {
    let mut with_pair = snapshot("case-1", "hello", "ids");
    with_pair
        .fields
        .insert(1, (PAIR_TEXT_HASH, hash_string("world")));

    let mut manifest = ValidationManifest::empty("m");
    manifest.cases.insert(
        "case-1".to_string(),
        serde_json::from_value(json!({"rs": {"legacy-hash": "keep-me"}})).expect("entry"),
    );
    reconcile(&mut manifest, Path::new("m.json"), "rs", &known(), &[with_pair])
        .expect("reconcile with pair");
    assert_eq!(
        manifest.snapshot("case-1", "rs").expect("rs")[PAIR_TEXT_HASH],
        hash_string("world")
    );

    let report = reconcile(
        &mut manifest,
        Path::new("m.json"),
        "rs",
        &known(),
        &[snapshot("case-1", "hello", "ids")],
    )
    .expect("reconcile without pair");
    assert_eq!(report.updated, vec!["case-1"]);
    let rs = manifest.snapshot("case-1", "rs").expect("rs");
    assert!(rs.get(PAIR_TEXT_HASH).is_none());
    assert_eq!(rs["legacy-hash"], "keep-me");
    assert_eq!(rs[IDS_HASH], "ids");
}

#[test]
fn retired_cases_are_pruned() {
    let mut manifest = ValidationManifest::empty("m");
    manifest.cases.insert(
        "retired".to_string(),
        serde_json::from_value(json!({"tokenx": {"text-hash": "x"}})).expect("entry"),
    );
    let report = reconcile(
        &mut manifest,
        Path::new("m.json"),
        "py",
        &known(),
        &[snapshot("case-1", "hello", "ids")],
    )
    .expect("reconcile");
    assert_eq!(report.pruned, vec!["retired"]);
    assert!(!manifest.cases.contains_key("retired"));
    assert!(manifest.cases.contains_key("case-1"));
}

#[test]
fn changed_text_hash_is_corruption_and_leaves_manifest_alone() {
    let mut manifest = ValidationManifest::empty("m");
    manifest.cases.insert(
        "case-1".to_string(),
        serde_json::from_value(json!({"py": {"text-hash": hash_string("old text")}}))
            .expect("entry"),
    );
    manifest.cases.insert(
        "retired".to_string(),
        serde_json::from_value(json!({"py": {}})).expect("entry"),
    );
    let before = manifest.clone();

    let err = reconcile(
        &mut manifest,
        Path::new("m.json"),
        "py",
        &known(),
        &[
            snapshot("case-0", "fresh", "ids"),
            snapshot("case-1", "new text", "ids"),
        ],
    )
    .expect_err("corruption");
    match err {
        ParityError::ManifestCorruption {
            case_id, backend, ..
        } => {
            assert_eq!(case_id, "case-1");
            assert_eq!(backend, "py");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(manifest, before);
}

#[test]
fn another_backends_text_hash_does_not_trigger_corruption() {
    let mut manifest = ValidationManifest::empty("m");
    manifest.cases.insert(
        "case-1".to_string(),
        serde_json::from_value(json!({"tokenx": {"text-hash": "stale"}})).expect("entry"),
    );
    reconcile(
        &mut manifest,
        Path::new("m.json"),
        "py",
        &known(),
        &[snapshot("case-1", "hello", "ids")],
    )
    .expect("other backends are not checked");
    assert_eq!(manifest.cases["case-1"]["tokenx"]["text-hash"], "stale");
}

#[test]
fn unknown_top_level_keys_and_model_file_survive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("m.json");
    write_json(
        &path,
        &json!({
            "version": 1,
            "model": "m",
            "modelFile": "spiece.model",
            "notes": "kept",
            "cases": {}
        }),
    );
    let mut file = ManifestFile::load_or_create(&path, "m").expect("load");
    file.reconcile("py", &known(), &[snapshot("case-1", "hello", "ids")])
        .expect("reconcile");
    file.write_if_dirty().expect("write");

    let reread: Value = serde_json::from_slice(&fs::read(&path).expect("read")).expect("json");
    assert_eq!(reread["modelFile"], "spiece.model");
    assert_eq!(reread["notes"], "kept");
}

#[test]
fn manifest_without_version_reads_as_version_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("m.json");
    write_json(
        &path,
        &json!({"model": "m", "modelFile": "spiece.model", "cases": {}}),
    );

    let mut file = ManifestFile::load_or_create(&path, "m").expect("versionless manifest loads");
    assert!(file.existed());
    assert_eq!(file.manifest.version, 1);
    assert_eq!(file.manifest.model_file.as_deref(), Some("spiece.model"));

    file.reconcile("rs", &known(), &[snapshot("case-1", "hello", "ids")])
        .expect("reconcile");
    assert!(file.write_if_dirty().expect("write"));
    let reread: Value = serde_json::from_slice(&fs::read(&path).expect("read")).expect("json");
    assert_eq!(reread["version"], 1);
    assert_eq!(reread["modelFile"], "spiece.model");
}

#[test]
fn version_and_model_mismatches_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("m.json");
    write_json(&path, &json!({"version": 2, "model": "m", "cases": {}}));
    assert!(matches!(
        ManifestFile::load_or_create(&path, "m"),
        Err(ParityError::ManifestFormat { .. })
    ));

    write_json(&path, &json!({"version": 1, "model": "other", "cases": {}}));
    assert!(matches!(
        ManifestFile::load_or_create(&path, "m"),
        Err(ParityError::ManifestFormat { .. })
    ));
}

#[test]
fn compare_reports_mismatches_and_incomplete_cases() {
    let manifest: ValidationManifest = serde_json::from_value(json!({
        "version": 1,
        "model": "m",
        "cases": {
            "same": {
                "py": {"text-hash": "t", "ids-hash": "i", "decoded-hash": "d"},
                "rs": {"text-hash": "t", "ids-hash": "i", "batch-texts-hash": "b"}
            },
            "diff": {
                "py": {"text-hash": "t", "ids-hash": "i1"},
                "rs": {"text-hash": "t", "ids-hash": "i2"}
            },
            "empty": {"py": {}, "rs": {"text-hash": "t"}},
            "missing": {"py": {"text-hash": "t"}}
        }
    }))
    .expect("manifest");

    let report = compare_snapshots(&manifest, "py", "rs");
    assert_eq!(report.matched, vec!["same"]);
    assert_eq!(report.mismatched.len(), 1);
    assert_eq!(report.mismatched[0].case_id, "diff");
    assert_eq!(report.mismatched[0].field, "ids-hash");
    assert_eq!(report.incomplete, vec!["empty", "missing"]);
    assert!(!report.is_clean());
}

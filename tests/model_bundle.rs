use access_arbiter::model_bundle::{BackendKind, ModelBundle, MANIFEST_FILE};
use access_arbiter::ArbiterError;
use std::fs;
use std::path::{Path, PathBuf};

fn demo_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models")
}

/// Copy of the demo bundle that a test may edit.
fn scratch_bundle() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for entry in fs::read_dir(demo_dir()).unwrap() {
        let entry = entry.unwrap();
        fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
    }
    dir
}

fn edit_json(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    edit(&mut value);
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

#[test]
fn demo_bundle_loads() {
    let bundle = ModelBundle::load(&demo_dir(), 0.65).unwrap();
    let summary = &bundle.summary;

    assert_eq!(summary.approval_backend, BackendKind::Logistic);
    assert_eq!(summary.approval_model, "approval_logistic_v1");
    assert_eq!(summary.approval_inputs, 34);
    assert_eq!(summary.anomaly_inputs, 25);
    assert_eq!(summary.anomaly_trees, 3);
    assert_eq!(summary.approval_threshold, 0.65);
    assert_eq!(summary.fingerprint.len(), 64);
    assert!(summary.fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn fingerprint_tracks_file_contents() {
    let dir = scratch_bundle();
    let before = ModelBundle::load(dir.path(), 0.65).unwrap().summary.fingerprint;
    assert_eq!(
        before,
        ModelBundle::load(&demo_dir(), 0.65).unwrap().summary.fingerprint
    );

    edit_json(&dir.path().join("approval_logistic.json"), |v| {
        v["bias"] = serde_json::json!(0.0);
    });
    let after = ModelBundle::load(dir.path(), 0.65).unwrap().summary.fingerprint;
    assert_ne!(before, after);
}

#[test]
fn approval_width_mismatch_fails_to_load() {
    let dir = scratch_bundle();
    edit_json(&dir.path().join("approval_logistic.json"), |v| {
        v["weights"].as_array_mut().unwrap().pop();
    });

    let err = ModelBundle::load(dir.path(), 0.65).err().expect("load should fail");
    assert!(matches!(err, ArbiterError::FeatureShape { .. }), "{err}");
}

#[test]
fn anomaly_width_mismatch_fails_to_load() {
    let dir = scratch_bundle();
    edit_json(&dir.path().join("anomaly_preprocessor.json"), |v| {
        v["numeric"] = serde_json::json!([]);
    });

    let err = ModelBundle::load(dir.path(), 0.65).err().expect("load should fail");
    assert!(matches!(err, ArbiterError::FeatureShape { .. }), "{err}");
}

#[test]
fn unknown_preprocessor_column_fails_to_load() {
    let dir = scratch_bundle();
    edit_json(&dir.path().join("approval_preprocessor.json"), |v| {
        v["numeric"][0] = serde_json::json!("shoe_size");
    });

    let err = ModelBundle::load(dir.path(), 0.65).err().expect("load should fail");
    match err {
        ArbiterError::FeatureShape { column, .. } => assert_eq!(column, "shoe_size"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_onnx_model_is_a_bundle_error() {
    let dir = scratch_bundle();
    fs::write(
        dir.path().join(MANIFEST_FILE),
        r#"
[approval]
preprocessor = "approval_preprocessor.json"
backend = "onnx"
model = "approval.onnx"

[anomaly]
preprocessor = "anomaly_preprocessor.json"
model = "anomaly_forest.json"
"#,
    )
    .unwrap();

    let err = ModelBundle::load(dir.path(), 0.65).err().expect("load should fail");
    assert!(matches!(err, ArbiterError::Bundle { .. }), "{err}");
}

#[test]
fn threshold_outside_unit_interval_is_rejected() {
    let err = ModelBundle::load(&demo_dir(), 1.5).err().expect("load should fail");
    assert!(matches!(err, ArbiterError::Config { .. }), "{err}");
}

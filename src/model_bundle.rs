//! Frozen model bundle loaded once at startup.
//!
//! A bundle is a directory holding `manifest.toml` plus the files it names:
//!
//! ```toml
//! [approval]
//! preprocessor = "approval_preprocessor.json"
//! backend = "logistic"            # or "onnx"
//! model = "approval_logistic.json"
//!
//! [anomaly]
//! preprocessor = "anomaly_preprocessor.json"
//! model = "anomaly_forest.json"
//! ```
//!
//! Any inconsistency is a startup failure; the service must not take
//! traffic with a partially loaded bundle.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::classifier::{Classifier, LogisticClassifier, LogisticWeights};
use crate::errors::{ArbiterError, ArbiterResult};
use crate::isolation_forest::IsolationForest;
use crate::model_adapters::{AnomalyGate, ApprovalClassifier};
use crate::onnx_classifier::OnnxClassifier;
use crate::preprocessor::Preprocessor;

pub const MANIFEST_FILE: &str = "manifest.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Logistic,
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub preprocessor: String,
    pub backend: BackendKind,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEntry {
    pub preprocessor: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub approval: ApprovalEntry,
    pub anomaly: AnomalyEntry,
}

/// What the health endpoint and `inspect-bundle` report.
#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub dir: String,
    pub fingerprint: String,
    pub approval_model: String,
    pub approval_backend: BackendKind,
    pub approval_inputs: usize,
    pub approval_threshold: f64,
    pub anomaly_model: String,
    pub anomaly_inputs: usize,
    pub anomaly_trees: usize,
}

/// Loaded, validated, read-only model bundle.
pub struct ModelBundle {
    pub approval: Arc<ApprovalClassifier>,
    pub anomaly: Arc<AnomalyGate>,
    pub summary: BundleSummary,
}

impl ModelBundle {
    /// Load the bundle in `dir`, applying `approval_threshold` to the
    /// approval classifier.
    pub fn load(dir: &Path, approval_threshold: f64) -> ArbiterResult<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest_text = read_text(&manifest_path)?;
        let manifest: BundleManifest = toml::from_str(&manifest_text).map_err(|e| {
            ArbiterError::bundle(manifest_path.display().to_string(), e.to_string())
        })?;

        let approval_pre: Preprocessor = read_json(&dir.join(&manifest.approval.preprocessor))?;
        approval_pre.validate()?;
        let approval_model_path = dir.join(&manifest.approval.model);
        let backend: Arc<dyn Classifier> = match manifest.approval.backend {
            BackendKind::Logistic => {
                let weights: LogisticWeights = read_json(&approval_model_path)?;
                Arc::new(LogisticClassifier::new(weights))
            }
            BackendKind::Onnx => Arc::new(OnnxClassifier::load(
                &approval_model_path,
                approval_pre.output_width(),
            )?),
        };
        let approval_model = backend.model_id().to_string();
        let approval_inputs = backend.input_width();

        let anomaly_pre: Preprocessor = read_json(&dir.join(&manifest.anomaly.preprocessor))?;
        let forest: IsolationForest = read_json(&dir.join(&manifest.anomaly.model))?;
        let anomaly_model = forest.model_id.clone();
        let anomaly_inputs = forest.n_features;
        let anomaly_trees = forest.trees.len();

        let approval = ApprovalClassifier::new(approval_pre, backend, approval_threshold)?;
        let anomaly = AnomalyGate::new(anomaly_pre, forest)?;

        let fingerprint = fingerprint(
            dir,
            &[
                MANIFEST_FILE,
                &manifest.approval.preprocessor,
                &manifest.approval.model,
                &manifest.anomaly.preprocessor,
                &manifest.anomaly.model,
            ],
        )?;

        let approval_threshold = approval.threshold();
        let summary = BundleSummary {
            dir: dir.display().to_string(),
            fingerprint,
            approval_model,
            approval_backend: manifest.approval.backend,
            approval_inputs,
            approval_threshold,
            anomaly_model,
            anomaly_inputs,
            anomaly_trees,
        };
        info!(
            dir = %summary.dir,
            fingerprint = %summary.fingerprint,
            approval = %summary.approval_model,
            anomaly = %summary.anomaly_model,
            "model bundle loaded"
        );

        Ok(Self {
            approval: Arc::new(approval),
            anomaly: Arc::new(anomaly),
            summary,
        })
    }
}

fn read_text(path: &Path) -> ArbiterResult<String> {
    fs::read_to_string(path)
        .map_err(|e| ArbiterError::bundle(path.display().to_string(), e.to_string()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ArbiterResult<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text)
        .map_err(|e| ArbiterError::bundle(path.display().to_string(), e.to_string()))
}

/// SHA-256 over each file's name and bytes, in manifest order.
fn fingerprint(dir: &Path, files: &[&str]) -> ArbiterResult<String> {
    let mut hasher = Sha256::new();
    for file in files {
        let path: PathBuf = dir.join(file);
        let bytes = fs::read(&path)
            .map_err(|e| ArbiterError::bundle(path.display().to_string(), e.to_string()))?;
        hasher.update(file.as_bytes());
        hasher.update([0u8]);
        hasher.update(&bytes);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

//! Adapters that put the frozen models behind one scoring interface.

use serde::Serialize;
use std::sync::Arc;

use crate::classifier::Classifier;
use crate::errors::{ArbiterError, ArbiterResult};
use crate::feature_builder::FeatureVector;
use crate::isolation_forest::IsolationForest;
use crate::preprocessor::Preprocessor;

/// One learned model's verdict on one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSignal {
    pub model: String,
    pub approved: bool,
    /// Probability for classifiers, unscaled score for detectors.
    pub score: Option<f64>,
    pub raw_label: i64,
}

/// Anything the decision composer can ask for a signal.
pub trait SignalModel: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, features: &FeatureVector) -> ArbiterResult<ModelSignal>;
}

/// Primary approval model: preprocessor + classifier + probability cutoff.
pub struct ApprovalClassifier {
    preprocessor: Preprocessor,
    backend: Arc<dyn Classifier>,
    threshold: f64,
}

impl ApprovalClassifier {
    pub fn new(
        preprocessor: Preprocessor,
        backend: Arc<dyn Classifier>,
        threshold: f64,
    ) -> ArbiterResult<Self> {
        preprocessor.validate()?;
        if preprocessor.output_width() != backend.input_width() {
            return Err(ArbiterError::feature_shape(
                "*",
                format!(
                    "approval preprocessor emits {} columns but {} expects {}",
                    preprocessor.output_width(),
                    backend.model_id(),
                    backend.input_width()
                ),
            ));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ArbiterError::config(format!(
                "approval threshold {threshold} outside [0, 1]"
            )));
        }
        Ok(Self {
            preprocessor,
            backend,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl SignalModel for ApprovalClassifier {
    fn name(&self) -> &str {
        self.backend.model_id()
    }

    fn score(&self, features: &FeatureVector) -> ArbiterResult<ModelSignal> {
        let row = self.preprocessor.transform(features)?;
        let output = self.backend.predict(&row)?;

        // An explicit cutoff only applies when the backend exposes a probability.
        let approved = match output.probability {
            Some(p) => p >= self.threshold,
            None => output.label == 1,
        };

        Ok(ModelSignal {
            model: self.backend.model_id().to_string(),
            approved,
            score: output.probability,
            raw_label: output.label,
        })
    }
}

/// Secondary outlier gate trained on historically approved requests.
pub struct AnomalyGate {
    preprocessor: Preprocessor,
    detector: IsolationForest,
}

impl AnomalyGate {
    pub fn new(preprocessor: Preprocessor, detector: IsolationForest) -> ArbiterResult<Self> {
        preprocessor.validate()?;
        detector.validate()?;
        if preprocessor.output_width() != detector.n_features {
            return Err(ArbiterError::feature_shape(
                "*",
                format!(
                    "anomaly preprocessor emits {} columns but {} expects {}",
                    preprocessor.output_width(),
                    detector.model_id,
                    detector.n_features
                ),
            ));
        }
        Ok(Self {
            preprocessor,
            detector,
        })
    }
}

impl SignalModel for AnomalyGate {
    fn name(&self) -> &str {
        &self.detector.model_id
    }

    fn score(&self, features: &FeatureVector) -> ArbiterResult<ModelSignal> {
        let row = self.preprocessor.transform(features)?;
        let (score, label) = self.detector.predict(&row)?;

        Ok(ModelSignal {
            model: self.detector.model_id.clone(),
            approved: label == 1,
            score: Some(score),
            raw_label: label,
        })
    }
}

use serde::{Deserialize, Serialize};

use crate::errors::{ArbiterError, ArbiterResult, Stage};

/// Raw output of a binary classifier backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierOutput {
    /// Native label, 1 = approve.
    pub label: i64,
    /// Probability of the approve class when the backend provides one.
    pub probability: Option<f64>,
}

/// Frozen binary classifier operating on an encoded row.
pub trait Classifier: Send + Sync {
    fn model_id(&self) -> &str;
    fn input_width(&self) -> usize;
    fn predict(&self, row: &[f32]) -> ArbiterResult<ClassifierOutput>;
}

/// Logistic regression weights as exported by the training job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticWeights {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    pub bias: f64,
    pub weights: Vec<f64>,
}

fn default_model_id() -> String {
    "logistic_v1".to_string()
}

/// Linear model with logistic scoring.
pub struct LogisticClassifier {
    weights: LogisticWeights,
}

impl LogisticClassifier {
    pub fn new(weights: LogisticWeights) -> Self {
        Self { weights }
    }
}

impl Classifier for LogisticClassifier {
    fn model_id(&self) -> &str {
        &self.weights.model_id
    }

    fn input_width(&self) -> usize {
        self.weights.weights.len()
    }

    fn predict(&self, row: &[f32]) -> ArbiterResult<ClassifierOutput> {
        if row.len() != self.weights.weights.len() {
            return Err(ArbiterError::model(
                Stage::ApprovalModel,
                format!(
                    "{} expects {} inputs, got {}",
                    self.weights.model_id,
                    self.weights.weights.len(),
                    row.len()
                ),
            ));
        }

        // bias + sum(weight_i * feature_i)
        let linear = self.weights.bias
            + row
                .iter()
                .zip(self.weights.weights.iter())
                .map(|(x, w)| *x as f64 * w)
                .sum::<f64>();
        let probability = 1.0 / (1.0 + (-linear).exp());

        Ok(ClassifierOutput {
            label: if probability >= 0.5 { 1 } else { 0 },
            probability: Some(probability),
        })
    }
}

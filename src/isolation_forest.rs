//! Isolation forest outlier detector, evaluated from exported trees.
//!
//! Scores follow the `score_samples` convention: the negated anomaly score,
//! so lower means more abnormal. A row is anomalous (label -1) when its
//! score falls below `offset`; otherwise it is normal (label 1).

use serde::{Deserialize, Serialize};

use crate::errors::{ArbiterError, ArbiterResult, Stage};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Rows with `row[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        n_samples: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    pub n_features: usize,
    /// Sub-sample size each tree was grown on.
    pub max_samples: usize,
    /// Decision offset; -0.5 for the untuned default.
    #[serde(default = "default_offset")]
    pub offset: f64,
    pub trees: Vec<IsolationTree>,
}

fn default_model_id() -> String {
    "isolation_forest_v1".to_string()
}

fn default_offset() -> f64 {
    -0.5
}

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl IsolationTree {
    fn path_length(&self, row: &[f32]) -> ArbiterResult<f64> {
        let mut index = 0;
        let mut depth = 0.0;
        // A well-formed tree never revisits a node, so its size bounds the walk.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).ok_or_else(|| {
                        ArbiterError::model(
                            Stage::AnomalyGate,
                            format!("split on feature {feature} outside row of {}", row.len()),
                        )
                    })?;
                    index = if (*value as f64) <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Some(TreeNode::Leaf { n_samples }) => {
                    return Ok(depth + average_path_length(*n_samples));
                }
                None => {
                    return Err(ArbiterError::model(
                        Stage::AnomalyGate,
                        format!("tree references missing node {index}"),
                    ))
                }
            }
        }
        Err(ArbiterError::model(Stage::AnomalyGate, "tree contains a cycle"))
    }
}

impl IsolationForest {
    pub fn validate(&self) -> ArbiterResult<()> {
        if self.trees.is_empty() {
            return Err(ArbiterError::model(Stage::AnomalyGate, "forest has no trees"));
        }
        if self.max_samples < 2 {
            return Err(ArbiterError::model(
                Stage::AnomalyGate,
                "max_samples must be at least 2",
            ));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            for node in &tree.nodes {
                if let TreeNode::Split {
                    feature, left, right, ..
                } = node
                {
                    if *feature >= self.n_features
                        || *left >= tree.nodes.len()
                        || *right >= tree.nodes.len()
                    {
                        return Err(ArbiterError::model(
                            Stage::AnomalyGate,
                            format!("tree {t} has an out-of-range split"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Negated anomaly score in [-1, 0]; lower is more abnormal.
    pub fn score_samples(&self, row: &[f32]) -> ArbiterResult<f64> {
        if row.len() != self.n_features {
            return Err(ArbiterError::model(
                Stage::AnomalyGate,
                format!(
                    "{} expects {} inputs, got {}",
                    self.model_id,
                    self.n_features,
                    row.len()
                ),
            ));
        }
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.path_length(row)?;
        }
        let mean_depth = total / self.trees.len() as f64;
        let anomaly = 2f64.powf(-mean_depth / average_path_length(self.max_samples));
        Ok(-anomaly)
    }

    /// 1 for normal, -1 for anomalous.
    pub fn predict(&self, row: &[f32]) -> ArbiterResult<(f64, i64)> {
        let score = self.score_samples(row)?;
        let label = if score < self.offset { -1 } else { 1 };
        Ok((score, label))
    }
}

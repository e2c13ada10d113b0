//! ONNX classifier backend running on tract.
//!
//! Expects a graph with a single `[1, width]` float input. Outputs are read
//! by type: an `i64` tensor is taken as the label, an `f32` tensor as class
//! probabilities (`[1, 2]` → column 1, a single value → that value).
//! Exporters that wrap probabilities in a ZipMap must disable it.

use std::path::Path;
use tract_onnx::prelude::*;

use crate::classifier::{Classifier, ClassifierOutput};
use crate::errors::{ArbiterError, ArbiterResult, Stage};

pub struct OnnxClassifier {
    model_id: String,
    width: usize,
    plan: TypedRunnableModel<TypedModel>,
}

impl OnnxClassifier {
    pub fn load(path: &Path, width: usize) -> ArbiterResult<Self> {
        let display = path.display().to_string();
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, width]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ArbiterError::bundle(&display, format!("loading ONNX model: {e}")))?;

        let model_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        Ok(Self {
            model_id,
            width,
            plan,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn input_width(&self) -> usize {
        self.width
    }

    fn predict(&self, row: &[f32]) -> ArbiterResult<ClassifierOutput> {
        let model_err = |e: String| ArbiterError::model(Stage::ApprovalModel, e);

        if row.len() != self.width {
            return Err(model_err(format!(
                "{} expects {} inputs, got {}",
                self.model_id,
                self.width,
                row.len()
            )));
        }

        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.width), row.to_vec())
            .map_err(|e| model_err(e.to_string()))?
            .into();
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| model_err(format!("onnx run: {e}")))?;

        let mut label = None;
        let mut probability = None;
        for output in outputs.iter() {
            match output.datum_type() {
                DatumType::I64 => {
                    let view = output
                        .to_array_view::<i64>()
                        .map_err(|e| model_err(e.to_string()))?;
                    label = view.iter().next().copied();
                }
                DatumType::F32 => {
                    let view = output
                        .to_array_view::<f32>()
                        .map_err(|e| model_err(e.to_string()))?;
                    let values: Vec<f32> = view.iter().copied().collect();
                    probability = match values.as_slice() {
                        [p] => Some(*p as f64),
                        [_, p, ..] => Some(*p as f64),
                        [] => None,
                    };
                }
                _ => {}
            }
        }

        let label = match (label, probability) {
            (Some(label), _) => label,
            (None, Some(p)) => i64::from(p >= 0.5),
            (None, None) => {
                return Err(model_err(format!(
                    "{} produced neither a label nor probabilities",
                    self.model_id
                )))
            }
        };

        Ok(ClassifierOutput { label, probability })
    }
}

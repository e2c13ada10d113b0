//! Frozen preprocessing transform: named features → dense `f32` row.
//!
//! Layout is one-hot blocks for the categorical columns, in declaration
//! order, followed by the numeric columns passed through. Categories the
//! encoder never saw encode as an all-zero block.

use serde::{Deserialize, Serialize};

use crate::errors::{ArbiterError, ArbiterResult};
use crate::feature_builder::{FeatureVector, FEATURE_COLUMNS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoding {
    pub column: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    #[serde(default)]
    pub categorical: Vec<CategoricalEncoding>,
    #[serde(default)]
    pub numeric: Vec<String>,
}

impl Preprocessor {
    /// Width of the encoded row.
    pub fn output_width(&self) -> usize {
        self.categorical
            .iter()
            .map(|c| c.categories.len())
            .sum::<usize>()
            + self.numeric.len()
    }

    /// Every declared column must be one the feature builder produces.
    pub fn validate(&self) -> ArbiterResult<()> {
        let declared = self
            .categorical
            .iter()
            .map(|c| c.column.as_str())
            .chain(self.numeric.iter().map(String::as_str));

        for column in declared {
            if !FEATURE_COLUMNS.contains(&column) {
                return Err(ArbiterError::feature_shape(
                    column,
                    "preprocessor expects a column the feature builder does not produce",
                ));
            }
        }
        if self.output_width() == 0 {
            return Err(ArbiterError::feature_shape("*", "preprocessor encodes no columns"));
        }
        for encoding in &self.categorical {
            if encoding.categories.is_empty() {
                return Err(ArbiterError::feature_shape(
                    &encoding.column,
                    "categorical column has no categories",
                ));
            }
        }
        Ok(())
    }

    pub fn transform(&self, features: &FeatureVector) -> ArbiterResult<Vec<f32>> {
        let mut row = Vec::with_capacity(self.output_width());

        for encoding in &self.categorical {
            let value = features.categorical(&encoding.column)?;
            row.extend(
                encoding
                    .categories
                    .iter()
                    .map(|category| if category == value { 1.0 } else { 0.0 }),
            );
        }
        for column in &self.numeric {
            row.push(features.numeric(column)? as f32);
        }
        Ok(row)
    }
}

use std::sync::Arc;
use tracing::info;

use crate::attribute_inferencer::AttributeInferencer;
use crate::config_loader::ArbiterConfig;
use crate::decision_composer::DecisionComposer;
use crate::errors::ArbiterResult;
use crate::input_validator::InputValidator;
use crate::model_bundle::{BundleSummary, ModelBundle};
use crate::text_classifier::{build_classifier, TextClassifier};

/// Shared, read-only state behind every handler.
pub struct AppState {
    pub composer: DecisionComposer,
    pub validator: InputValidator,
    pub bundle: BundleSummary,
}

impl AppState {
    pub fn new(
        composer: DecisionComposer,
        validator: InputValidator,
        bundle: BundleSummary,
    ) -> Self {
        Self {
            composer,
            validator,
            bundle,
        }
    }

    /// Wire the service from configuration: load the bundle, build the
    /// collaborator client and compose the pipeline.
    pub fn from_config(config: &ArbiterConfig) -> ArbiterResult<Arc<Self>> {
        let classifier: Arc<dyn TextClassifier> = Arc::from(build_classifier(&config.inference)?);
        Self::with_classifier(config, classifier)
    }

    /// Same as [`AppState::from_config`] with a caller-supplied collaborator.
    pub fn with_classifier(
        config: &ArbiterConfig,
        classifier: Arc<dyn TextClassifier>,
    ) -> ArbiterResult<Arc<Self>> {
        let bundle = ModelBundle::load(&config.bundle.dir, config.decision.approval_threshold)?;
        let inferencer = AttributeInferencer::new(classifier, config.inference.timeout());
        info!(
            classifier = inferencer.classifier_name(),
            threshold = config.decision.approval_threshold,
            anomaly_policy = ?config.decision.anomaly_policy,
            "decision pipeline ready"
        );
        let composer = DecisionComposer::new(
            inferencer,
            bundle.approval,
            bundle.anomaly,
            config.decision.settings(),
        );
        Ok(Arc::new(Self::new(
            composer,
            InputValidator::new(config.server.max_query_chars),
            bundle.summary,
        )))
    }
}

//! Decision composer: sequences inference, features, policy and models for
//! one request and assembles the report.
//!
//! Precedence:
//! 1. an inference failure ends the request with a server error,
//! 2. a policy verdict is final and no model runs,
//! 3. an approval-model denial is final and the anomaly gate does not run,
//! 4. the anomaly gate settles every remaining request.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::attribute_inferencer::{AttributeInferencer, InferredAttributes};
use crate::errors::{ArbiterError, ArbiterResult};
use crate::feature_builder::{self, FeatureVector};
use crate::model_adapters::{ModelSignal, SignalModel};
use crate::policy_gate::{PolicyGate, PolicyInput, PolicyRule, PolicyVerdict};
use crate::profile::{AccessRequest, RequesterProfile};

/// What happens to an approval the anomaly gate flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyPolicy {
    /// Flagged requests are denied.
    #[default]
    Deny,
    /// Flagged requests are approved and marked for review.
    Flag,
}

/// Stage that produced the final decision. Serialized as `policy:<rule>`,
/// `approval_model` or `anomaly_gate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecidedBy {
    Policy(PolicyRule),
    ApprovalModel,
    AnomalyGate,
}

impl fmt::Display for DecidedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecidedBy::Policy(rule) => write!(f, "policy:{}", rule.id()),
            DecidedBy::ApprovalModel => f.write_str("approval_model"),
            DecidedBy::AnomalyGate => f.write_str("anomaly_gate"),
        }
    }
}

impl Serialize for DecidedBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalDecision {
    pub approved: bool,
    pub status: String,
    pub reason: String,
    pub decided_by: DecidedBy,
    /// Set when the anomaly gate flagged an approval under [`AnomalyPolicy::Flag`].
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDetails {
    pub user_role: String,
    pub department: String,
    pub employee_status: String,
    pub resource_type: String,
    pub resource_sensitivity: String,
    pub request_reason: String,
    pub time_in_position: String,
    pub past_violations: u32,
    pub last_security_training: Option<String>,
    pub employee_join_date: Option<String>,
    pub years_of_service: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelOutputs {
    pub approval_prediction: i64,
    pub approval_probability: Option<f64>,
    pub anomaly_score: Option<f64>,
    pub anomaly_prediction: Option<i64>,
    pub signals: Vec<ModelSignal>,
}

/// Terminal artifact of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionReport {
    pub request_id: Uuid,
    pub query: String,
    pub inferred_data: InferredAttributes,
    pub request_details: RequestDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_outputs: Option<ModelOutputs>,
    pub final_decision: FinalDecision,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionSettings {
    pub anomaly_policy: AnomalyPolicy,
    /// Fixed "today" for date arithmetic; the current UTC date when unset.
    pub reference_date: Option<NaiveDate>,
}

pub struct DecisionComposer {
    inferencer: AttributeInferencer,
    gate: PolicyGate,
    approval: Arc<dyn SignalModel>,
    anomaly: Arc<dyn SignalModel>,
    settings: DecisionSettings,
}

impl DecisionComposer {
    pub fn new(
        inferencer: AttributeInferencer,
        approval: Arc<dyn SignalModel>,
        anomaly: Arc<dyn SignalModel>,
        settings: DecisionSettings,
    ) -> Self {
        Self {
            inferencer,
            gate: PolicyGate::new(),
            approval,
            anomaly,
            settings,
        }
    }

    pub async fn decide(&self, request: &AccessRequest) -> ArbiterResult<DecisionReport> {
        let request_id = Uuid::new_v4();
        let span = info_span!("decide", %request_id);
        self.decide_inner(request_id, request).instrument(span).await
    }

    async fn decide_inner(
        &self,
        request_id: Uuid,
        request: &AccessRequest,
    ) -> ArbiterResult<DecisionReport> {
        let query = request.query.as_str();
        let profile = &request.profile;

        let inferred = self.inferencer.infer(query, profile).await;
        if let Some(failure) = &inferred.error {
            return Err(ArbiterError::inference(failure.message.clone(), inferred.clone()));
        }
        let attributes = inferred.attributes;

        let reference = self
            .settings
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let features = feature_builder::build(profile, &attributes, reference)?;
        let years_of_service = features.years_of_service()?;

        let assemble = |model_outputs: Option<ModelOutputs>, final_decision: FinalDecision| {
            info!(
                approved = final_decision.approved,
                decided_by = %final_decision.decided_by,
                sensitivity = %attributes.resource_sensitivity,
                reason = %attributes.request_reason,
                "decision composed"
            );
            DecisionReport {
                request_id,
                query: query.to_string(),
                inferred_data: inferred.clone(),
                request_details: request_details(profile, &features, years_of_service),
                model_outputs,
                final_decision,
            }
        };

        let verdict = self.gate.evaluate(&PolicyInput {
            query,
            profile,
            attributes: &attributes,
            years_of_service,
        });
        match verdict {
            PolicyVerdict::Deny(rule) => {
                let denied = decision(false, "Denied", rule.reason(), DecidedBy::Policy(rule));
                return Ok(assemble(None, denied));
            }
            PolicyVerdict::Approve(rule) => {
                let approved = decision(true, "Approved", rule.reason(), DecidedBy::Policy(rule));
                return Ok(assemble(None, approved));
            }
            PolicyVerdict::Defer => {}
        }

        let approval = self.approval.score(&features)?;
        if !approval.approved {
            let outputs = model_outputs(approval, None);
            return Ok(assemble(
                Some(outputs),
                decision(false, "Denied", "Denied - model prediction", DecidedBy::ApprovalModel),
            ));
        }

        let anomaly = self.anomaly.score(&features)?;
        let final_decision = match (anomaly.approved, self.settings.anomaly_policy) {
            (true, _) => decision(
                true,
                "Approved",
                "Approved - confirmed by anomaly detection",
                DecidedBy::AnomalyGate,
            ),
            (false, AnomalyPolicy::Deny) => decision(
                false,
                "Denied",
                "Denied - flagged as anomalous behavior",
                DecidedBy::AnomalyGate,
            ),
            (false, AnomalyPolicy::Flag) => FinalDecision {
                flagged: true,
                ..decision(
                    true,
                    "Approved - flagged for review",
                    "Approved but flagged as anomalous",
                    DecidedBy::AnomalyGate,
                )
            },
        };
        Ok(assemble(Some(model_outputs(approval, Some(anomaly))), final_decision))
    }
}

fn decision(approved: bool, status: &str, reason: &str, decided_by: DecidedBy) -> FinalDecision {
    FinalDecision {
        approved,
        status: status.to_string(),
        reason: reason.to_string(),
        decided_by,
        flagged: false,
    }
}

fn model_outputs(approval: ModelSignal, anomaly: Option<ModelSignal>) -> ModelOutputs {
    let mut outputs = ModelOutputs {
        approval_prediction: approval.raw_label,
        approval_probability: approval.score,
        anomaly_score: None,
        anomaly_prediction: None,
        signals: vec![approval],
    };
    if let Some(anomaly) = anomaly {
        outputs.anomaly_score = anomaly.score;
        outputs.anomaly_prediction = Some(anomaly.raw_label);
        outputs.signals.push(anomaly);
    }
    outputs
}

fn request_details(
    profile: &RequesterProfile,
    features: &FeatureVector,
    years_of_service: u32,
) -> RequestDetails {
    let text = |column: &str| {
        features
            .categorical(column)
            .map(str::to_string)
            .unwrap_or_default()
    };
    let months = features.numeric("time_in_position").unwrap_or_default();

    RequestDetails {
        user_role: text("user_role"),
        department: text("department"),
        employee_status: text("employee_status"),
        resource_type: text("resource_type"),
        resource_sensitivity: text("resource_sensitivity"),
        request_reason: text("request_reason"),
        time_in_position: format!("{months} months"),
        past_violations: profile.past_violations,
        last_security_training: profile.last_security_training.clone(),
        employee_join_date: profile.employee_join_date.clone(),
        years_of_service,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decided_by_serializes_as_stage_string() {
        let json = serde_json::to_value(DecidedBy::Policy(PolicyRule::ManagerBypass)).unwrap();
        assert_eq!(json, serde_json::json!("policy:manager_bypass"));

        let json = serde_json::to_value(DecidedBy::AnomalyGate).unwrap();
        assert_eq!(json, serde_json::json!("anomaly_gate"));
    }

    #[test]
    fn anomaly_policy_defaults_to_deny() {
        assert_eq!(AnomalyPolicy::default(), AnomalyPolicy::Deny);
        let p: AnomalyPolicy = serde_json::from_str("\"flag\"").unwrap();
        assert_eq!(p, AnomalyPolicy::Flag);
    }

    #[test]
    fn model_outputs_collect_signals() {
        let approval = ModelSignal {
            model: "a".into(),
            approved: true,
            score: Some(0.8),
            raw_label: 1,
        };
        let anomaly = ModelSignal {
            model: "b".into(),
            approved: false,
            score: Some(-0.7),
            raw_label: -1,
        };
        let outputs = model_outputs(approval, Some(anomaly));
        assert_eq!(outputs.approval_probability, Some(0.8));
        assert_eq!(outputs.anomaly_prediction, Some(-1));
        assert_eq!(outputs.signals.len(), 2);
    }
}

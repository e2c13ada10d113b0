use access_arbiter::attribute_inferencer::AttributeInferencer;
use access_arbiter::decision_composer::DecidedBy;
use access_arbiter::feature_builder::FeatureVector;
use access_arbiter::model_adapters::{ModelSignal, SignalModel};
use access_arbiter::policy_gate::PolicyRule;
use access_arbiter::text_classifier::TextClassifier;
use access_arbiter::{
    AccessRequest, AnomalyPolicy, ArbiterError, ArbiterResult, DecisionComposer,
    DecisionSettings, RequesterProfile,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Scripted(String);

#[async_trait]
impl TextClassifier for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, _prompt: &str) -> ArbiterResult<String> {
        Ok(self.0.clone())
    }
}

/// Signal model that records how often it was asked.
struct Counting {
    name: &'static str,
    approved: bool,
    calls: AtomicUsize,
}

impl Counting {
    fn new(name: &'static str, approved: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            approved,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SignalModel for Counting {
    fn name(&self) -> &str {
        self.name
    }

    fn score(&self, features: &FeatureVector) -> ArbiterResult<ModelSignal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(features.columns().count(), 11);
        Ok(ModelSignal {
            model: self.name.to_string(),
            approved: self.approved,
            score: Some(if self.approved { 0.9 } else { 0.2 }),
            raw_label: if self.approved { 1 } else { 0 },
        })
    }
}

fn reply(resource_type: &str, reason: &str, sensitivity: &str) -> String {
    format!(
        "```json\n{{\"resource_type\": \"{resource_type}\", \"request_reason\": \"{reason}\", \"resource_sensitivity\": \"{sensitivity}\", \"reasoning\": \"scripted\"}}\n```"
    )
}

fn composer(
    response: String,
    approval: Arc<Counting>,
    anomaly: Arc<Counting>,
    anomaly_policy: AnomalyPolicy,
) -> DecisionComposer {
    DecisionComposer::new(
        AttributeInferencer::new(Arc::new(Scripted(response)), Duration::from_secs(2)),
        approval,
        anomaly,
        DecisionSettings {
            anomaly_policy,
            reference_date: NaiveDate::from_ymd_opt(2025, 4, 5),
        },
    )
}

fn request(query: &str, profile: RequesterProfile) -> AccessRequest {
    AccessRequest {
        query: query.to_string(),
        profile,
    }
}

fn sales_manager() -> RequesterProfile {
    RequesterProfile {
        user_role: "Sales Manager".into(),
        department: "Sales".into(),
        employee_status: "Full-time".into(),
        past_violations: 0,
        time_in_position: Some("3 years".into()),
        employee_join_date: Some("2019-03-01".into()),
        last_security_training: Some("2025-01-15".into()),
        ..Default::default()
    }
}

fn engineer() -> RequesterProfile {
    RequesterProfile {
        user_role: "Employee".into(),
        department: "Engineering".into(),
        employee_status: "Full-time".into(),
        past_violations: 0,
        time_in_position: Some("18 months".into()),
        employee_join_date: Some("2022-06-01".into()),
        last_security_training: Some("Never".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn quarterly_sales_report_takes_manager_bypass() {
    let approval = Counting::new("approval", false);
    let anomaly = Counting::new("anomaly", false);
    let composer = composer(
        reply("spreadsheet", "Routine check", "restricted"),
        approval.clone(),
        anomaly.clone(),
        AnomalyPolicy::Deny,
    );

    let report = composer
        .decide(&request("I need the quarterly sales report", sales_manager()))
        .await
        .unwrap();

    assert!(report.final_decision.approved);
    assert_eq!(report.final_decision.status, "Approved");
    assert_eq!(
        report.final_decision.reason,
        "Approved - manager bypass for routine performance data"
    );
    assert_eq!(
        report.final_decision.decided_by,
        DecidedBy::Policy(PolicyRule::ManagerBypass)
    );
    assert!(report.model_outputs.is_none());
    assert_eq!(report.request_details.years_of_service, 6);
    assert_eq!(report.request_details.time_in_position, "36 months");
    assert_eq!(approval.calls() + anomaly.calls(), 0);
}

#[tokio::test]
async fn personal_photo_storage_is_denied_by_policy() {
    let approval = Counting::new("approval", true);
    let anomaly = Counting::new("anomaly", true);
    let composer = composer(
        reply("image", "Personal use", "confidential"),
        approval.clone(),
        anomaly.clone(),
        AnomalyPolicy::Deny,
    );

    let report = composer
        .decide(&request("I want to store my personal photos", engineer()))
        .await
        .unwrap();

    assert!(!report.final_decision.approved);
    assert_eq!(
        report.final_decision.reason,
        "Denied - personal use not allowed for sensitive resources"
    );
    assert_eq!(approval.calls() + anomaly.calls(), 0);
}

#[tokio::test]
async fn terminated_employee_never_reaches_models() {
    let approval = Counting::new("approval", true);
    let anomaly = Counting::new("anomaly", true);
    let composer = composer(
        reply("doc", "Audit", "restricted"),
        approval.clone(),
        anomaly.clone(),
        AnomalyPolicy::Deny,
    );
    let profile = RequesterProfile {
        employee_status: "Terminated".into(),
        ..engineer()
    };

    let report = composer
        .decide(&request("audit binder for last year", profile))
        .await
        .unwrap();

    assert_eq!(report.final_decision.reason, "Denied - terminated employee");
    assert_eq!(
        serde_json::to_value(report.final_decision.decided_by).unwrap(),
        "policy:terminated_employee"
    );
    assert_eq!(approval.calls(), 0);
}

#[tokio::test]
async fn model_denial_skips_anomaly_gate() {
    let approval = Counting::new("approval", false);
    let anomaly = Counting::new("anomaly", true);
    let composer = composer(
        reply("doc", "Client request", "public"),
        approval.clone(),
        anomaly.clone(),
        AnomalyPolicy::Deny,
    );

    let report = composer
        .decide(&request("client onboarding checklist", engineer()))
        .await
        .unwrap();

    assert!(!report.final_decision.approved);
    assert_eq!(report.final_decision.reason, "Denied - model prediction");
    assert_eq!(report.final_decision.decided_by, DecidedBy::ApprovalModel);
    let outputs = report.model_outputs.expect("model outputs");
    assert_eq!(outputs.approval_prediction, 0);
    assert_eq!(outputs.anomaly_prediction, None);
    assert_eq!(approval.calls(), 1);
    assert_eq!(anomaly.calls(), 0);
}

#[tokio::test]
async fn approval_confirmed_by_anomaly_gate() {
    let approval = Counting::new("approval", true);
    let anomaly = Counting::new("anomaly", true);
    let composer = composer(
        reply("doc", "Routine check", "public"),
        approval.clone(),
        anomaly.clone(),
        AnomalyPolicy::Deny,
    );

    let report = composer
        .decide(&request("team onboarding wiki page", engineer()))
        .await
        .unwrap();

    assert!(report.final_decision.approved);
    assert_eq!(
        report.final_decision.reason,
        "Approved - confirmed by anomaly detection"
    );
    assert_eq!(report.final_decision.decided_by, DecidedBy::AnomalyGate);
    assert_eq!(report.model_outputs.unwrap().signals.len(), 2);
    assert_eq!(anomaly.calls(), 1);
}

#[tokio::test]
async fn anomaly_policy_controls_flagged_approvals() {
    for (policy, approved) in [(AnomalyPolicy::Deny, false), (AnomalyPolicy::Flag, true)] {
        let composer = composer(
            reply("doc", "Routine check", "public"),
            Counting::new("approval", true),
            Counting::new("anomaly", false),
            policy,
        );
        let report = composer
            .decide(&request("team onboarding wiki page", engineer()))
            .await
            .unwrap();

        assert_eq!(report.final_decision.approved, approved, "{policy:?}");
        assert_eq!(report.final_decision.flagged, approved);
    }
}

#[tokio::test]
async fn malformed_collaborator_output_is_a_server_error() {
    let approval = Counting::new("approval", true);
    let anomaly = Counting::new("anomaly", true);
    let composer = composer(
        "I am unable to help with that.".into(),
        approval.clone(),
        anomaly.clone(),
        AnomalyPolicy::Deny,
    );

    let err = composer
        .decide(&request("quarterly revenue", sales_manager()))
        .await
        .unwrap_err();

    match err {
        ArbiterError::Inference { sentinel, .. } => {
            assert!(sentinel.is_failure());
            let json = serde_json::to_value(&*sentinel).unwrap();
            assert_eq!(json["resource_type"], "unknown");
            assert_eq!(json["resource_sensitivity"], "public");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(approval.calls() + anomaly.calls(), 0);
}

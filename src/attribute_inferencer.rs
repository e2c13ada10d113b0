//! Attribute inference: free-text query + requester profile → resource labels.
//!
//! The classifier collaborator is asked for one fenced JSON block. Whatever
//! comes back is validated against the closed vocabularies; failures never
//! raise but produce a sentinel carrying an error marker, which the decision
//! composer must treat as terminal.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::profile::RequesterProfile;
use crate::text_classifier::TextClassifier;
use crate::vocabulary::{choice_list, RequestReason, ResourceType, Sensitivity};

lazy_static! {
    static ref JSON_BLOCK: Regex = Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").unwrap();
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    pub resource_type: ResourceType,
    pub request_reason: RequestReason,
    pub resource_sensitivity: Sensitivity,
}

/// Error marker attached to a sentinel attribute set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceFailure {
    pub message: String,
}

/// Output of [`AttributeInferencer::infer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredAttributes {
    #[serde(flatten)]
    pub attributes: ResourceAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InferenceFailure>,
}

impl InferredAttributes {
    /// Default labels plus an error marker.
    pub fn sentinel(message: impl Into<String>) -> Self {
        Self {
            attributes: ResourceAttributes::default(),
            reasoning: None,
            error: Some(InferenceFailure {
                message: message.into(),
            }),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Turns free text into [`ResourceAttributes`] through a [`TextClassifier`].
pub struct AttributeInferencer {
    classifier: Arc<dyn TextClassifier>,
    timeout: Duration,
}

impl AttributeInferencer {
    pub fn new(classifier: Arc<dyn TextClassifier>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify `query` for `profile`. Never fails; check
    /// [`InferredAttributes::is_failure`].
    pub async fn infer(&self, query: &str, profile: &RequesterProfile) -> InferredAttributes {
        let prompt = build_prompt(query, profile);

        let response =
            match tokio::time::timeout(self.timeout, self.classifier.classify(&prompt)).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!(
                        classifier = self.classifier.name(),
                        error = %e,
                        "classifier call failed"
                    );
                    return InferredAttributes::sentinel(format!("classifier call failed: {e}"));
                }
                Err(_) => {
                    warn!(
                        classifier = self.classifier.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "classifier call timed out"
                    );
                    return InferredAttributes::sentinel(format!(
                        "classifier call timed out after {}ms",
                        self.timeout.as_millis()
                    ));
                }
            };

        let parsed = parse_response(&response, profile);
        if let Some(failure) = &parsed.error {
            warn!(message = %failure.message, "classifier response rejected");
        } else {
            debug!(attributes = ?parsed.attributes, "attributes inferred");
        }
        parsed
    }
}

/// Classification prompt embedding the vocabularies, worked examples and
/// profile-aware guidelines.
pub fn build_prompt(query: &str, profile: &RequesterProfile) -> String {
    let role = non_blank(&profile.user_role, "unspecified");
    let department = non_blank(&profile.department, "unspecified");
    let status = non_blank(&profile.employee_status, "unspecified");
    let tenure = profile
        .time_in_position
        .as_deref()
        .map(|t| non_blank(t, "unspecified"))
        .unwrap_or("unspecified");

    format!(
        r#"# Classification Task

Analyze the following user query and classify the requested information according to predefined categories.

## User Query:
"{query}"

## Requester:
- role: {role}
- department: {department}
- employment status: {status}
- time in position: {tenure}
- past policy violations: {violations}

## Classification Schema:
- resource_type: Select exactly one from [{types}]
- request_reason: Select exactly one from [{reasons}]
- resource_sensitivity: Select exactly one from [{sensitivities}]

## Resource Sensitivity Examples:
1. public: information that can be freely shared with all employees
   - "I need the company's leave policy document"
   - "Can I see the cafeteria menu for this week?"
2. restricted: information with limited circulation within departments or teams
   - "I need to check last quarter's sales numbers for my team"
   - "I'd like to see the department's budget allocation spreadsheet"
3. confidential: highly sensitive information with strict access controls
   - "I need the salary information for my direct reports"
   - "I need access to the executive board meeting notes"

## Reasoning Guidelines:
- Junior roles (intern, trainee, contractor) asking for team or company internals lean towards restricted or confidential.
- Short tenure (under 6 months) or repeated past violations should make you stricter about sensitivity, never looser.
- Senior roles asking for their own team's performance data is usually restricted, not confidential.
- Requests for personal storage, private files or non-work purposes use the "Personal use" reason.

## Required Output Format:
Return ONLY a JSON object enclosed in ```json ... ``` markers, using exactly this structure:

```json
{{
    "resource_type": "one of the allowed resource types",
    "request_reason": "one of the allowed request reasons",
    "resource_sensitivity": "one of the allowed sensitivity levels",
    "reasoning": "one short sentence explaining the sensitivity choice"
}}
```
"#,
        violations = profile.past_violations,
        types = choice_list(&ResourceType::CHOICES),
        reasons = choice_list(&RequestReason::CHOICES),
        sensitivities = choice_list(&Sensitivity::CHOICES),
    )
}

/// Parse a classifier response into validated attributes.
///
/// The fenced block wins; otherwise the whole body is tried. A response that
/// yields no JSON object produces the sentinel.
pub fn parse_response(response: &str, profile: &RequesterProfile) -> InferredAttributes {
    let candidate = JSON_BLOCK
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| response.trim());

    let object = match serde_json::from_str::<serde_json::Value>(candidate) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => return InferredAttributes::sentinel("classifier response is not a JSON object"),
        Err(_) => {
            return InferredAttributes::sentinel("failed to parse classifier response as JSON")
        }
    };

    let field = |name: &str| object.get(name).and_then(|v| v.as_str());

    let resource_type = parse_label(field("resource_type")).unwrap_or_default();
    let resource_sensitivity = parse_label(field("resource_sensitivity"))
        .or_else(|| parse_label(profile.resource_sensitivity.as_deref()))
        .unwrap_or_default();
    let request_reason = parse_label::<RequestReason>(field("request_reason"))
        .filter(|r| *r != RequestReason::Unknown)
        .or_else(|| parse_label(profile.request_reason.as_deref()))
        .unwrap_or_default();
    let reasoning = field("reasoning")
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    InferredAttributes {
        attributes: ResourceAttributes {
            resource_type,
            request_reason,
            resource_sensitivity,
        },
        reasoning,
        error: None,
    }
}

fn parse_label<T: FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}

fn non_blank<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ArbiterError, ArbiterResult, Stage};
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextClassifier for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn classify(&self, _prompt: &str) -> ArbiterResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextClassifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn classify(&self, _prompt: &str) -> ArbiterResult<String> {
            Err(ArbiterError::model(Stage::Inference, "HTTP 503"))
        }
    }

    struct Slow;

    #[async_trait]
    impl TextClassifier for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn classify(&self, _prompt: &str) -> ArbiterResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("```json {} ```".into())
        }
    }

    #[test]
    fn parses_fenced_block() {
        let response = "Sure!\n```json\n{\"resource_type\": \"spreadsheet\", \"request_reason\": \"Routine check\", \"resource_sensitivity\": \"restricted\", \"reasoning\": \"team numbers\"}\n```\nthanks";
        let parsed = parse_response(response, &RequesterProfile::default());
        assert!(!parsed.is_failure());
        assert_eq!(parsed.attributes.resource_type, ResourceType::Spreadsheet);
        assert_eq!(parsed.attributes.request_reason, RequestReason::RoutineCheck);
        assert_eq!(parsed.attributes.resource_sensitivity, Sensitivity::Restricted);
        assert_eq!(parsed.reasoning.as_deref(), Some("team numbers"));
    }

    #[test]
    fn falls_back_to_whole_body() {
        let response = r#"{"resource_type": "pdf", "request_reason": "Audit", "resource_sensitivity": "confidential"}"#;
        let parsed = parse_response(response, &RequesterProfile::default());
        assert!(!parsed.is_failure());
        assert_eq!(parsed.attributes.resource_type, ResourceType::Pdf);
        assert_eq!(parsed.attributes.resource_sensitivity, Sensitivity::Confidential);
    }

    #[test]
    fn malformed_response_yields_sentinel() {
        let parsed = parse_response("I cannot help with that.", &RequesterProfile::default());
        assert!(parsed.is_failure());
        assert_eq!(parsed.attributes, ResourceAttributes::default());

        let parsed = parse_response("```json\n[1, 2, 3]\n```", &RequesterProfile::default());
        assert!(parsed.is_failure());
    }

    #[test]
    fn out_of_vocabulary_values_use_defaults() {
        let response = r#"```json
{"resource_type": "hologram", "request_reason": "curiosity", "resource_sensitivity": "top secret"}
```"#;
        let parsed = parse_response(response, &RequesterProfile::default());
        assert!(!parsed.is_failure());
        assert_eq!(parsed.attributes.resource_type, ResourceType::Unknown);
        assert_eq!(parsed.attributes.request_reason, RequestReason::Unknown);
        assert_eq!(parsed.attributes.resource_sensitivity, Sensitivity::Public);
    }

    #[test]
    fn missing_fields_use_caller_defaults() {
        let profile = RequesterProfile {
            resource_sensitivity: Some("restricted".into()),
            request_reason: Some("Audit".into()),
            ..Default::default()
        };
        let parsed = parse_response(r#"{"resource_type": "doc"}"#, &profile);
        assert_eq!(parsed.attributes.resource_sensitivity, Sensitivity::Restricted);
        assert_eq!(parsed.attributes.request_reason, RequestReason::Audit);
    }

    #[test]
    fn prompt_embeds_vocabularies_and_profile() {
        let profile = RequesterProfile {
            user_role: "Intern".into(),
            past_violations: 3,
            ..Default::default()
        };
        let prompt = build_prompt("show me payroll", &profile);
        assert!(prompt.contains("\"show me payroll\""));
        assert!(prompt.contains("doc, spreadsheet, video, presentation, pdf, image"));
        assert!(prompt.contains("Routine check, Client request, Audit, Personal use, Urgent approval"));
        assert!(prompt.contains("confidential, restricted, public"));
        assert!(prompt.contains("role: Intern"));
        assert!(prompt.contains("past policy violations: 3"));
    }

    #[tokio::test]
    async fn infer_uses_classifier_output() {
        let inferencer = AttributeInferencer::new(
            Arc::new(Canned(
                "```json\n{\"resource_type\": \"image\", \"request_reason\": \"Personal use\", \"resource_sensitivity\": \"confidential\"}\n```",
            )),
            Duration::from_secs(1),
        );
        let inferred = inferencer
            .infer("personal photo storage", &RequesterProfile::default())
            .await;
        assert!(!inferred.is_failure());
        assert_eq!(inferred.attributes.request_reason, RequestReason::PersonalUse);
    }

    #[tokio::test]
    async fn transport_failure_yields_sentinel() {
        let inferencer = AttributeInferencer::new(Arc::new(Failing), Duration::from_secs(1));
        let inferred = inferencer.infer("anything", &RequesterProfile::default()).await;
        assert!(inferred.is_failure());
    }

    #[tokio::test]
    async fn timeout_yields_sentinel() {
        let inferencer = AttributeInferencer::new(Arc::new(Slow), Duration::from_millis(50));
        let inferred = inferencer.infer("anything", &RequesterProfile::default()).await;
        let failure = inferred.error.expect("should time out");
        assert!(failure.message.contains("timed out"));
    }
}

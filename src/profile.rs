use serde::{Deserialize, Serialize};

/// Requester profile supplied by the caller with every request.
///
/// Nothing here is persisted. Optional fields are encoded with documented
/// fallbacks by the feature builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequesterProfile {
    #[serde(default)]
    pub user_role: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub employee_status: String,
    #[serde(default)]
    pub past_violations: u32,
    /// Caller-side sensitivity, used when inference does not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_sensitivity: Option<String>,
    /// Caller-side request reason, used when inference does not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_reason: Option<String>,
    /// Free text such as "7 years", "3 months" or "6".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_join_date: Option<String>,
    /// A date or the sentinel "Never".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_security_training: Option<String>,
}

impl RequesterProfile {
    /// True when the caller sent `{}` or only blank values.
    pub fn is_empty(&self) -> bool {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().map_or(true, |v| v.trim().is_empty())
        }

        self.user_role.trim().is_empty()
            && self.department.trim().is_empty()
            && self.employee_status.trim().is_empty()
            && self.past_violations == 0
            && blank(&self.resource_sensitivity)
            && blank(&self.request_reason)
            && blank(&self.time_in_position)
            && blank(&self.employee_join_date)
            && blank(&self.last_security_training)
    }

    pub fn is_terminated(&self) -> bool {
        self.employee_status.trim().eq_ignore_ascii_case("terminated")
    }

    pub fn is_full_time(&self) -> bool {
        let status: String = self
            .employee_status
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        status == "fulltime"
    }

    /// Role text names a manager-or-above position.
    pub fn is_manager_or_above(&self) -> bool {
        let role = self.user_role.to_lowercase();
        ["manager", "director", "executive", "lead"]
            .iter()
            .any(|keyword| role.contains(keyword))
    }
}

/// Incoming arbitration request as received on the wire.
///
/// Both fields are optional at the serde level so that their absence is
/// reported as a validation error rather than a JSON rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub user_profile: Option<RequesterProfile>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub query: String,
    pub profile: RequesterProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_is_detected() {
        let profile: RequesterProfile = serde_json::from_str("{}").unwrap();
        assert!(profile.is_empty());

        let profile: RequesterProfile =
            serde_json::from_str(r#"{"employee_status": "Full-time"}"#).unwrap();
        assert!(!profile.is_empty());
    }

    #[test]
    fn role_keywords_mark_managers() {
        let mut profile = RequesterProfile {
            user_role: "Engineering Lead".into(),
            ..Default::default()
        };
        assert!(profile.is_manager_or_above());

        profile.user_role = "Intern".into();
        assert!(!profile.is_manager_or_above());
    }

    #[test]
    fn status_checks_ignore_case() {
        let profile = RequesterProfile {
            employee_status: "TERMINATED".into(),
            ..Default::default()
        };
        assert!(profile.is_terminated());
        assert!(!profile.is_full_time());

        for status in ["Full-time", "full time", "FULL_TIME", "fulltime"] {
            let profile = RequesterProfile {
                employee_status: status.into(),
                ..Default::default()
            };
            assert!(profile.is_full_time(), "{status}");
        }
    }
}

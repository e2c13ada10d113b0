//! Deterministic policy checks evaluated before any learned model.
//!
//! Rules run in a fixed order and the first match wins. Both deny rules come
//! before the manager bypass, so a terminated employee or a personal-use
//! request for sensitive data can never be approved through the bypass.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::attribute_inferencer::ResourceAttributes;
use crate::profile::RequesterProfile;
use crate::vocabulary::RequestReason;

lazy_static! {
    static ref PERFORMANCE_TERMS: Regex = Regex::new(
        r"(?i)\b(performance|sales|revenue|quarterly|kpis?|metrics?|forecasts?|productivity|appraisals?)\b"
    )
    .unwrap();
}

/// Minimum completed years of service for the bypass.
pub const BYPASS_MIN_YEARS: u32 = 2;
/// Violation count at which the bypass is withdrawn.
pub const BYPASS_MAX_VIOLATIONS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRule {
    TerminatedEmployee,
    PersonalUseSensitive,
    ManagerBypass,
}

impl PolicyRule {
    pub fn id(&self) -> &'static str {
        match self {
            PolicyRule::TerminatedEmployee => "terminated_employee",
            PolicyRule::PersonalUseSensitive => "personal_use_sensitive",
            PolicyRule::ManagerBypass => "manager_bypass",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            PolicyRule::TerminatedEmployee => "Denied - terminated employee",
            PolicyRule::PersonalUseSensitive => {
                "Denied - personal use not allowed for sensitive resources"
            }
            PolicyRule::ManagerBypass => "Approved - manager bypass for routine performance data",
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Outcome of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    Deny(PolicyRule),
    Approve(PolicyRule),
    Defer,
}

/// Everything the rules look at.
pub struct PolicyInput<'a> {
    pub query: &'a str,
    pub profile: &'a RequesterProfile,
    pub attributes: &'a ResourceAttributes,
    pub years_of_service: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyGate;

impl PolicyGate {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, input: &PolicyInput<'_>) -> PolicyVerdict {
        let sensitive = input.attributes.resource_sensitivity.is_sensitive();

        if sensitive && input.profile.is_terminated() {
            return PolicyVerdict::Deny(PolicyRule::TerminatedEmployee);
        }
        if sensitive && input.attributes.request_reason == RequestReason::PersonalUse {
            return PolicyVerdict::Deny(PolicyRule::PersonalUseSensitive);
        }
        if manager_bypass_applies(input) {
            return PolicyVerdict::Approve(PolicyRule::ManagerBypass);
        }
        PolicyVerdict::Defer
    }
}

/// All five conditions must hold at once.
fn manager_bypass_applies(input: &PolicyInput<'_>) -> bool {
    input.profile.is_manager_or_above()
        && is_performance_query(input.query)
        && input.years_of_service >= BYPASS_MIN_YEARS
        && input.profile.is_full_time()
        && input.profile.past_violations < BYPASS_MAX_VIOLATIONS
}

pub fn is_performance_query(query: &str) -> bool {
    PERFORMANCE_TERMS.is_match(query)
}

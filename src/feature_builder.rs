//! Feature builder: requester profile + inferred attributes → [`FeatureVector`].
//!
//! Pure and infallible for caller input: unparseable tenure, dates and
//! join dates map to conservative constants instead of errors. Shape errors
//! only arise when a frozen preprocessor asks for a column the vector does
//! not carry (see [`FeatureVector::categorical`] / [`FeatureVector::numeric`]).

use chrono::{DateTime, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::attribute_inferencer::ResourceAttributes;
use crate::errors::{ArbiterError, ArbiterResult};
use crate::profile::RequesterProfile;

lazy_static! {
    static ref FIRST_INTEGER: Regex = Regex::new(r"\d+").unwrap();
}

/// Missing or sentinel dates count as five years stale.
pub const STALE_DAYS: i64 = 365 * 5;

/// Violation counts above this are clamped before encoding.
pub const MAX_PAST_VIOLATIONS: u32 = 50;

const UNKNOWN: &str = "unknown";

/// Spellings the frozen encoders were fitted on. Case, spaces, hyphens and
/// underscores are ignored when matching caller input against them.
const KNOWN_ROLES: [&str; 6] = [
    "Employee",
    "Intern",
    "Manager",
    "Director",
    "Executive",
    "Contractor",
];
const KNOWN_DEPARTMENTS: [&str; 6] = [
    "Engineering",
    "Sales",
    "HR",
    "Finance",
    "Marketing",
    "Legal",
];
const KNOWN_STATUSES: [&str; 4] = ["Full-time", "Part-time", "Contractor", "Terminated"];

/// Column order of every feature vector. Frozen preprocessors select from
/// these by name.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "user_role",
    "department",
    "employee_status",
    "resource_type",
    "resource_sensitivity",
    "request_reason",
    "time_in_position",
    "past_violations",
    "days_since_last_security_training",
    "days_since_employee_join_date",
    "years_of_service",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Categorical(String),
    Numeric(f64),
}

/// Fixed-order named features for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    fields: Vec<(&'static str, FeatureValue)>,
}

impl FeatureVector {
    pub fn from_fields(fields: Vec<(&'static str, FeatureValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.fields
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn categorical(&self, column: &str) -> ArbiterResult<&str> {
        match self.get(column) {
            Some(FeatureValue::Categorical(value)) => Ok(value),
            Some(FeatureValue::Numeric(_)) => Err(ArbiterError::feature_shape(
                column,
                "expected a categorical value, found numeric",
            )),
            None => Err(ArbiterError::feature_shape(column, "column missing from feature vector")),
        }
    }

    pub fn numeric(&self, column: &str) -> ArbiterResult<f64> {
        match self.get(column) {
            Some(FeatureValue::Numeric(value)) => Ok(*value),
            Some(FeatureValue::Categorical(_)) => Err(ArbiterError::feature_shape(
                column,
                "expected a numeric value, found categorical",
            )),
            None => Err(ArbiterError::feature_shape(column, "column missing from feature vector")),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    pub(crate) fn len(&self) -> usize {
        self.fields.len()
    }

    /// Derived tenure used by the manager bypass rule.
    pub fn years_of_service(&self) -> ArbiterResult<u32> {
        self.numeric("years_of_service").map(|v| v as u32)
    }
}

/// Build the feature vector for one request.
pub fn build(
    profile: &RequesterProfile,
    attributes: &ResourceAttributes,
    reference: NaiveDate,
) -> ArbiterResult<FeatureVector> {
    let join_date = profile.employee_join_date.as_deref();

    let fields = vec![
        ("user_role", canonical(&profile.user_role, &KNOWN_ROLES)),
        ("department", canonical(&profile.department, &KNOWN_DEPARTMENTS)),
        ("employee_status", canonical(&profile.employee_status, &KNOWN_STATUSES)),
        ("resource_type", categorical(attributes.resource_type.as_str())),
        (
            "resource_sensitivity",
            categorical(attributes.resource_sensitivity.as_str()),
        ),
        ("request_reason", categorical(attributes.request_reason.as_str())),
        (
            "time_in_position",
            FeatureValue::Numeric(tenure_months(profile.time_in_position.as_deref()) as f64),
        ),
        (
            "past_violations",
            FeatureValue::Numeric(profile.past_violations.min(MAX_PAST_VIOLATIONS) as f64),
        ),
        (
            "days_since_last_security_training",
            FeatureValue::Numeric(
                days_since(profile.last_security_training.as_deref(), reference) as f64,
            ),
        ),
        (
            "days_since_employee_join_date",
            FeatureValue::Numeric(days_since(join_date, reference) as f64),
        ),
        (
            "years_of_service",
            FeatureValue::Numeric(years_of_service(join_date, reference) as f64),
        ),
    ];

    let vector = FeatureVector::from_fields(fields);
    check_layout(&vector)?;
    Ok(vector)
}

/// The builder must emit exactly [`FEATURE_COLUMNS`], in order.
fn check_layout(vector: &FeatureVector) -> ArbiterResult<()> {
    if vector.len() != FEATURE_COLUMNS.len() {
        return Err(ArbiterError::feature_shape(
            "*",
            format!(
                "built {} columns, expected {}",
                vector.len(),
                FEATURE_COLUMNS.len()
            ),
        ));
    }
    for (built, expected) in vector.columns().zip(FEATURE_COLUMNS) {
        if built != expected {
            return Err(ArbiterError::feature_shape(
                built,
                format!("out of order, expected {expected}"),
            ));
        }
    }
    Ok(())
}

fn categorical(value: &str) -> FeatureValue {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        FeatureValue::Categorical(UNKNOWN.to_string())
    } else {
        FeatureValue::Categorical(trimmed.to_string())
    }
}

/// Like [`categorical`], but snaps loose spellings of a known category
/// ("full time", "MANAGER") onto the encoder's spelling. Unknown values pass
/// through trimmed.
fn canonical(value: &str, known: &[&'static str]) -> FeatureValue {
    let key = category_key(value);
    match known.iter().find(|candidate| category_key(candidate) == key) {
        Some(candidate) => FeatureValue::Categorical((*candidate).to_string()),
        None => categorical(value),
    }
}

fn category_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Tenure text to months: "7 years" → 84, "3 months" → 3, "6" → 6,
/// anything unparseable → 0.
pub fn tenure_months(text: Option<&str>) -> u32 {
    let Some(text) = text else {
        return 0;
    };
    let lowered = text.trim().to_lowercase();
    let quantity = || {
        FIRST_INTEGER
            .find(&lowered)
            .and_then(|m| m.as_str().parse::<u32>().ok())
    };

    if lowered.contains("year") {
        quantity().map_or(0, |years| years.saturating_mul(12))
    } else if lowered.contains("month") {
        quantity().unwrap_or(0)
    } else {
        lowered.parse::<u32>().unwrap_or(0)
    }
}

/// Days between an ISO date and `reference`. Missing, "Never",
/// "invalid_date" and unparseable input give [`STALE_DAYS`].
pub fn days_since(date: Option<&str>, reference: NaiveDate) -> i64 {
    let Some(text) = date.map(str::trim) else {
        return STALE_DAYS;
    };
    if text.eq_ignore_ascii_case("never") || text.eq_ignore_ascii_case("invalid_date") {
        return STALE_DAYS;
    }
    match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        Ok(parsed) => (reference - parsed).num_days(),
        Err(_) => STALE_DAYS,
    }
}

const JOIN_DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d %B %Y",
    "%B %d, %Y",
];

/// Parse a join date in any accepted format.
pub fn parse_join_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    JOIN_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Completed years between the join date and `reference`; 0 when the date
/// is missing, unparseable or in the future.
pub fn years_of_service(join_date: Option<&str>, reference: NaiveDate) -> u32 {
    join_date
        .and_then(parse_join_date)
        .and_then(|joined| reference.years_since(joined))
        .unwrap_or(0)
}

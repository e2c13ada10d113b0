//! Closed vocabularies for inferred resource attributes.
//!
//! Labels coming back from the text classifier are never trusted as-is:
//! they are parsed into these enums and anything outside them is rejected
//! so the caller can apply its per-field default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Doc,
    Spreadsheet,
    Video,
    Presentation,
    Pdf,
    Image,
    #[default]
    Unknown,
}

impl ResourceType {
    /// Labels offered to the classifier. `Unknown` is a fallback only.
    pub const CHOICES: [ResourceType; 6] = [
        ResourceType::Doc,
        ResourceType::Spreadsheet,
        ResourceType::Video,
        ResourceType::Presentation,
        ResourceType::Pdf,
        ResourceType::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Doc => "doc",
            ResourceType::Spreadsheet => "spreadsheet",
            ResourceType::Video => "video",
            ResourceType::Presentation => "presentation",
            ResourceType::Pdf => "pdf",
            ResourceType::Image => "image",
            ResourceType::Unknown => "unknown",
        }
    }
}

impl FromStr for ResourceType {
    type Err = ();

    fn from_str(input: &str) -> Result<ResourceType, Self::Err> {
        match normalize(input).as_str() {
            "doc" => Ok(ResourceType::Doc),
            "spreadsheet" => Ok(ResourceType::Spreadsheet),
            "video" => Ok(ResourceType::Video),
            "presentation" => Ok(ResourceType::Presentation),
            "pdf" => Ok(ResourceType::Pdf),
            "image" => Ok(ResourceType::Image),
            "unknown" => Ok(ResourceType::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Ambiguous inference resolves here. This is fail-open on sensitivity
    /// and is relied on by the policy gate and the models alike.
    #[default]
    Public,
    Restricted,
    Confidential,
}

impl Sensitivity {
    pub const CHOICES: [Sensitivity; 3] = [
        Sensitivity::Confidential,
        Sensitivity::Restricted,
        Sensitivity::Public,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Public => "public",
            Sensitivity::Restricted => "restricted",
            Sensitivity::Confidential => "confidential",
        }
    }

    /// Restricted and confidential resources are subject to the deny rules.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Sensitivity::Restricted | Sensitivity::Confidential)
    }
}

impl FromStr for Sensitivity {
    type Err = ();

    fn from_str(input: &str) -> Result<Sensitivity, Self::Err> {
        match normalize(input).as_str() {
            "public" => Ok(Sensitivity::Public),
            "restricted" => Ok(Sensitivity::Restricted),
            "confidential" => Ok(Sensitivity::Confidential),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestReason {
    #[serde(rename = "Routine check")]
    RoutineCheck,
    #[serde(rename = "Client request")]
    ClientRequest,
    #[serde(rename = "Audit")]
    Audit,
    #[serde(rename = "Personal use")]
    PersonalUse,
    #[serde(rename = "Urgent approval")]
    UrgentApproval,
    #[serde(rename = "unknown")]
    #[default]
    Unknown,
}

impl RequestReason {
    pub const CHOICES: [RequestReason; 5] = [
        RequestReason::RoutineCheck,
        RequestReason::ClientRequest,
        RequestReason::Audit,
        RequestReason::PersonalUse,
        RequestReason::UrgentApproval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestReason::RoutineCheck => "Routine check",
            RequestReason::ClientRequest => "Client request",
            RequestReason::Audit => "Audit",
            RequestReason::PersonalUse => "Personal use",
            RequestReason::UrgentApproval => "Urgent approval",
            RequestReason::Unknown => "unknown",
        }
    }
}

impl FromStr for RequestReason {
    type Err = ();

    fn from_str(input: &str) -> Result<RequestReason, Self::Err> {
        match normalize(input).as_str() {
            "routine check" => Ok(RequestReason::RoutineCheck),
            "client request" => Ok(RequestReason::ClientRequest),
            "audit" => Ok(RequestReason::Audit),
            "personal use" => Ok(RequestReason::PersonalUse),
            "urgent approval" => Ok(RequestReason::UrgentApproval),
            "unknown" => Ok(RequestReason::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RequestReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comma-separated label list for prompts.
pub fn choice_list<T: fmt::Display>(choices: &[T]) -> String {
    choices
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

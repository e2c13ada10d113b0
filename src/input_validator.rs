use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{ArbiterError, ArbiterResult};
use crate::profile::{AccessRequest, DecisionRequest};

lazy_static! {
    static ref CONTROL_CHARS: Regex = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
}

/// Gatekeeper for external decision requests.
pub struct InputValidator {
    max_query_chars: usize,
}

impl InputValidator {
    pub fn new(max_query_chars: usize) -> Self {
        Self { max_query_chars }
    }

    /// Turn a wire request into an [`AccessRequest`], or a client error.
    pub fn validate(&self, request: DecisionRequest) -> ArbiterResult<AccessRequest> {
        let query = request
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ArbiterError::validation("query", "query is required"))?;

        let length = query.chars().count();
        if length > self.max_query_chars {
            return Err(ArbiterError::validation(
                "query",
                format!(
                    "query is {length} characters, limit is {}",
                    self.max_query_chars
                ),
            ));
        }
        if CONTROL_CHARS.is_match(&query) {
            return Err(ArbiterError::validation(
                "query",
                "query contains control characters",
            ));
        }

        let profile = request
            .user_profile
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ArbiterError::validation("user_profile", "user_profile is required"))?;

        Ok(AccessRequest { query, profile })
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(2000)
    }
}

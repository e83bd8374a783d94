//! Semantic validation for route files and settings.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function of its input
//! - Runs before a route table or settings value is accepted

use std::collections::HashSet;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::Settings;
use crate::routing::normalize_key;

/// A single semantic problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route #{index} has an empty key")]
    EmptyKey { index: usize },

    #[error("route '{key}' has target '{target}', which is not an absolute URL")]
    InvalidTarget { key: String, target: String },

    #[error("route '{key}' is defined more than once")]
    DuplicateKey { key: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Join errors for display.
pub fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check route entries in file order.
pub fn validate_routes(entries: &[(String, String)]) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, (key, target)) in entries.iter().enumerate() {
        let key = normalize_key(key);
        if key.is_empty() {
            errors.push(ValidationError::EmptyKey { index });
            continue;
        }

        if !is_absolute_url(target) {
            errors.push(ValidationError::InvalidTarget {
                key: key.to_string(),
                target: target.clone(),
            });
        }

        if !seen.insert(key) {
            errors.push(ValidationError::DuplicateKey {
                key: key.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The target must parse with a scheme and be usable as a `Location` value.
fn is_absolute_url(target: &str) -> bool {
    let parsed = match url::Url::parse(target) {
        Ok(url) => url,
        Err(_) => return false,
    };
    !parsed.cannot_be_a_base() && HeaderValue::from_str(target).is_ok()
}

/// Check numeric settings.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.listener.port == 0 {
        errors.push(ValidationError::Zero { field: "listener.port" });
    }
    if settings.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if settings.store.max_txn_bytes == 0 {
        errors.push(ValidationError::Zero { field: "store.max_txn_bytes" });
    }
    if settings.store.max_txn_entries == 0 {
        errors.push(ValidationError::Zero { field: "store.max_txn_entries" });
    }
    if settings.store.hit_flush_secs == 0 {
        errors.push(ValidationError::Zero { field: "store.hit_flush_secs" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// Generated by `katana generate` from "Pet Store". Do not edit by hand.
//
// Validators are total and allocation-free on the success path: every
// check either returns early with the offending field or falls through.

#![allow(dead_code, unused_imports)]

use katana::dispatch::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::*;

/// Validate a `Pet` against its schema constraints.
pub fn validate_pet(value: &Pet) -> Option<ValidationError> {
    if value.id < 1 {
        return Some(ValidationError::new("id", "must be >= 1"));
    }
    if value.name.chars().count() < 1 {
        return Some(ValidationError::new("name", "length must be >= 1"));
    }
    if let Some(ref status) = value.status {
        if !["available", "sold"].contains(&status.as_str()) {
            return Some(ValidationError::new("status", "must be one of: available, sold"));
        }
    }
    None
}

// Generated by `katana generate` from "Pet Store". Do not edit by hand.
//
// Each parser drives the serde JSON cursor straight into the typed value:
// scalars are read once into their fields, with no intermediate document
// tree.

#![allow(dead_code, unused_imports)]

use super::types::*;

/// Parse an arbitrary JSON body.
pub fn parse_json_value(bytes: &[u8]) -> Option<serde_json::Value> {
    serde_json::from_slice(bytes).ok()
}

/// Parse a JSON array of integers.
pub fn parse_i64_array(bytes: &[u8]) -> Option<Vec<i64>> {
    serde_json::from_slice(bytes).ok()
}

/// Parse a JSON array of numbers.
pub fn parse_f64_array(bytes: &[u8]) -> Option<Vec<f64>> {
    serde_json::from_slice(bytes).ok()
}

/// Parse a JSON array of booleans.
pub fn parse_bool_array(bytes: &[u8]) -> Option<Vec<bool>> {
    serde_json::from_slice(bytes).ok()
}

/// Parse a JSON array of strings.
pub fn parse_string_array(bytes: &[u8]) -> Option<Vec<String>> {
    serde_json::from_slice(bytes).ok()
}

/// Parse a `Pet` request body.
pub fn parse_pet(bytes: &[u8]) -> Option<Pet> {
    serde_json::from_slice(bytes).ok()
}

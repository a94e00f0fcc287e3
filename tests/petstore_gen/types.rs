// Generated by `katana generate` from "Pet Store". Do not edit by hand.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// `Pet` from the OpenAPI components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// Generated by `katana generate` from "Pet Store". Do not edit by hand.

#![allow(dead_code, unused_imports)]

use katana::http::Response;

use super::types::*;

/// Implemented by the application: one method per operation.
///
/// The handler instance is shared across all reactor threads, so
/// implementations must be thread-safe. Inside a method the raw request
/// and the request arena are reachable through
/// `katana::http::context::with_current`.
pub trait ApiHandler: Send + Sync {
    /// GET /pets
    ///
    /// List all pets
    fn list_pets(&self, limit: Option<i64>) -> Response;

    /// POST /pets
    ///
    /// Create a pet
    fn create_pet(&self, body: Pet) -> Response;

    /// GET /pets/{petId}
    ///
    /// Find a pet by id
    fn get_pet(&self, pet_id: i64, x_trace: Option<&str>, session: Option<&str>) -> Response;
}

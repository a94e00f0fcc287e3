// Generated by `katana generate` from "Pet Store". Do not edit by hand.

#![allow(dead_code)]

/// One route-table entry from the OpenAPI document.
#[derive(Debug, Clone, Copy)]
pub struct GeneratedRoute {
    /// Path pattern with `{param}` placeholders.
    pub path: &'static str,
    /// HTTP method.
    pub method: &'static str,
    /// The operation's `operationId`.
    pub operation_id: &'static str,
    /// Request media types this operation accepts.
    pub consumes: &'static [&'static str],
    /// Response media types this operation produces.
    pub produces: &'static [&'static str],
}

/// Every operation in the document, ordered by path then method.
pub static ROUTES: &[GeneratedRoute] = &[
    GeneratedRoute {
        path: "/pets",
        method: "GET",
        operation_id: "listPets",
        consumes: &[],
        produces: &["application/json"],
    },
    GeneratedRoute {
        path: "/pets",
        method: "POST",
        operation_id: "createPet",
        consumes: &["application/json"],
        produces: &["application/json"],
    },
    GeneratedRoute {
        path: "/pets/{petId}",
        method: "GET",
        operation_id: "getPet",
        consumes: &[],
        produces: &["application/json"],
    },
];

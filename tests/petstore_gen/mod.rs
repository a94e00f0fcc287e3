// Generated by `katana generate` from "Pet Store". Do not edit by hand.

pub mod dispatch;
pub mod handlers;
pub mod parsers;
pub mod routes;
pub mod types;
pub mod validators;

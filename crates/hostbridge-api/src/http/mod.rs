//! HTTP interface.

pub mod handlers;
pub mod routes;
pub mod sse;

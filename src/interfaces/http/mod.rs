//! HTTP REST API
//!
//! - `common`: response envelope, error mapping, identity and validated JSON
//! - `modules`: handlers and DTOs per resource, plus request-id and metrics middleware
//! - `router`: route table, OpenAPI document and layers

pub mod common;
pub mod modules;
pub mod router;

pub use router::{create_api_router, ApiDoc, ApiState};

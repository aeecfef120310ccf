//! Outer surfaces: the REST API and the WebSocket event stream

pub mod http;
pub mod ws;

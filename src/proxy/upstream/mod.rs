// Upstream module - forwarding to the backend API

pub mod client;
pub mod headers;
pub mod target;

pub use client::{InboundRequest, UpstreamClient};
pub use headers::ForwardHeaders;

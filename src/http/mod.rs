//! HTTP surface of the adapter
//!
//! Tool endpoints live in `handlers`, the event-stream endpoints in `sse`.

pub mod handlers;
pub mod sse;

//! Boundary to the external tool registry
//!
//! The HTTP layer only ever sees this trait. Implementors supply whichever
//! capabilities they have; the defaults report the capability as missing.

use async_trait::async_trait;
use rust_mcp_sdk::schema::{ContentBlock, Tool};
use serde_json::{Map, Value};
use thiserror::Error;

pub type ToolArguments = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("operation not supported by dispatcher")]
    Unsupported,
    #[error("{0}")]
    InvocationFailed(String),
    #[error("{0}")]
    ListFailed(String),
}

/// Shared across all requests, so implementations must tolerate concurrent calls.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn invoke(
        &self,
        _name: &str,
        _arguments: ToolArguments,
    ) -> Result<Vec<ContentBlock>, DispatchError> {
        Err(DispatchError::Unsupported)
    }

    async fn list(&self) -> Result<Vec<Tool>, DispatchError> {
        Err(DispatchError::Unsupported)
    }
}

/// Stand-in used by the binary when no registry has been wired in.
#[derive(Debug, Default)]
pub struct UnconfiguredDispatcher;

impl UnconfiguredDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolDispatcher for UnconfiguredDispatcher {}

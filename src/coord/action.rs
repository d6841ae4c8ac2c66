//! DirectiveExecutor - the external collaborator that answers blocks
//!
//! Executors are opaque: they receive a block's content and return a result
//! text. Every call gets the run context so long network calls can observe
//! cancellation and deadlines.

use async_trait::async_trait;

use crate::core::context::RunContext;

#[async_trait]
pub trait DirectiveExecutor: Send + Sync {
    /// Get the name of this executor
    fn name(&self) -> &str;

    /// Answer one block's content
    async fn execute(&self, ctx: &RunContext, content: &str) -> anyhow::Result<String>;
}

/// Example: echo executor that answers with the block content itself
pub struct EchoExecutor;

#[async_trait]
impl DirectiveExecutor for EchoExecutor {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, _ctx: &RunContext, content: &str) -> anyhow::Result<String> {
        tracing::debug!("Echo executor answering {} bytes", content.len());
        Ok(content.to_string())
    }
}

//! # Strategies
//!
//! A strategy contributes a fixed list of stages between `start` and `end`
//! and a body run when each of them is emitted. Stages added by plugins at
//! runtime have no body.

use crate::error::Result;
use crate::pipeline::context::Context;
use async_trait::async_trait;

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Stages to schedule for this execution
    fn stages(&self, context: &Context) -> Vec<String>;

    /// Body of one of the declared stages
    async fn on(&self, stage: &str, context: &Context) -> Result<()>;
}

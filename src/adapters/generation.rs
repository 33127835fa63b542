//! Generator adapters.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{GenerationRequest, ResponseGenerator};

/// Dry-run generator: the reply is the instruction set generation would get.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayEchoGenerator;

#[async_trait]
impl ResponseGenerator for OverlayEchoGenerator {
    async fn generate(&self, request: &GenerationRequest) -> DomainResult<String> {
        Ok(format!(
            "[{} / {}]\n{}",
            request.phase, request.action, request.instructions
        ))
    }
}

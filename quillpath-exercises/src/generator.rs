//! Exercise generator contract.

use crate::error::GeneratorError;
use crate::types::{ExerciseKind, ExerciseRecord, GenerationRequest};
use async_trait::async_trait;

/// Produces one exercise per call.
///
/// Implemented by the LLM client wrapper. Implementations own their
/// degradation path: when the live service is disabled they may answer
/// with static content marked as [`ExerciseRecord::fallback`].
#[async_trait]
pub trait ExerciseGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<ExerciseRecord, GeneratorError>;
}

/// Generator serving canned exercises, used when no live generator is
/// configured.
#[derive(Clone, Debug, Default)]
pub struct StaticGenerator;

#[async_trait]
impl ExerciseGenerator for StaticGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<ExerciseRecord, GeneratorError> {
        let topic = if request.topic.is_empty() {
            "your week"
        } else {
            request.topic.as_str()
        };
        let (prompt, instructions) = match request.kind {
            ExerciseKind::Rewrite => (
                format!("Rewrite this paragraph about {topic} so every sentence is clear and correct."),
                "Fix punctuation, agreement and run-on sentences.",
            ),
            ExerciseKind::Sequencing => (
                format!("Put the sentences about {topic} into a logical order."),
                "Drag each sentence into place.",
            ),
            ExerciseKind::FillInBlank => (
                format!("Complete the passage about {topic} with the missing words."),
                "Choose the word that best fits each blank.",
            ),
            ExerciseKind::FreeWrite => (
                format!("Write a short paragraph about {topic}."),
                "Aim for five to eight sentences.",
            ),
        };
        Ok(ExerciseRecord::new(request, prompt)
            .with_instructions(instructions)
            .as_fallback())
    }
}

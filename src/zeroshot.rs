use log::{info, warn};

use crate::backend::{CompletionBackend, CompletionError};
use crate::data::{Record, TextField};
use crate::error::PipelineError;
use crate::metrics::PredictionResult;

/// A fixed natural-language prompt with exactly one `{speech}` placeholder.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

pub const PLACEHOLDER: &str = "{speech}";

impl PromptTemplate {
    /// Creates a template, validating the substitution contract: exactly one
    /// placeholder bound to the truncated speech text.
    ///
    /// # Errors
    /// - `Validation` if the placeholder is missing or appears more than once
    pub fn new(template: impl Into<String>) -> Result<Self, PipelineError> {
        let template = template.into();
        let count = template.matches(PLACEHOLDER).count();
        if count != 1 {
            return Err(PipelineError::Validation(format!(
                "prompt template must contain exactly one {} placeholder, found {}",
                PLACEHOLDER, count
            )));
        }
        Ok(Self { template })
    }

    pub fn render(&self, speech: &str) -> String {
        self.template.replace(PLACEHOLDER, speech)
    }
}

/// Configuration for zero-shot prompted classification.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on newly generated tokens beyond the prompt
    pub max_response_tokens: usize,
    /// Performance knob only; batching must not change individual outputs
    pub batch_size: usize,
    /// Speeches are cut to this many leading characters before prompt
    /// construction, bounding generation latency and memory
    pub prefix_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_response_tokens: 10,
            batch_size: 8,
            prefix_chars: 500,
        }
    }
}

/// A zero-shot prediction along with the raw generated continuation.
#[derive(Debug, Clone)]
pub struct ZeroShotPrediction {
    pub record_id: String,
    /// Raw continuation text, empty when the batch was degraded after timeout
    pub raw_output: String,
    pub predicted: Option<u8>,
    pub true_label: u8,
}

impl ZeroShotPrediction {
    pub fn as_result(&self) -> PredictionResult {
        PredictionResult {
            record_id: self.record_id.clone(),
            predicted: self.predicted,
            true_label: self.true_label,
        }
    }
}

/// Decides the binary label carried by a generated continuation.
///
/// If the literal character '0' appears anywhere in the continuation the
/// label is 0; otherwise if '1' appears the label is 1; otherwise the answer
/// is unknown. The scan has no position or context awareness, so when both
/// digits appear "0" wins unconditionally, and a digit inside an unrelated
/// numeral (a year, say) is indistinguishable from an intentional answer.
/// Known weakness; changing the rule shifts every reported accuracy figure,
/// so it stays fixed.
pub fn extract_label(continuation: &str) -> Option<u8> {
    if continuation.contains('0') {
        Some(0)
    } else if continuation.contains('1') {
        Some(1)
    } else {
        None
    }
}

/// Cuts a speech to its leading `prefix_chars` characters, respecting char
/// boundaries. Deliberate information loss: speeches are typically far longer
/// than the bound.
fn truncate_prefix(text: &str, prefix_chars: usize) -> &str {
    match text.char_indices().nth(prefix_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Builds prompts from raw speeches, invokes a generative text-completion
/// capability, and extracts a binary label from the free-form output.
pub struct PromptInferenceEngine<C> {
    backend: C,
    config: EngineConfig,
}

impl<C: CompletionBackend> PromptInferenceEngine<C> {
    pub fn new(backend: C, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    /// Classifies every record with a single prompted generation each,
    /// preserving input order.
    ///
    /// A batch that times out is retried once at half the batch size; records
    /// whose sub-batch still times out degrade to unknown predictions rather
    /// than aborting the run. Unknown predictions are retained and count as
    /// incorrect downstream.
    ///
    /// # Errors
    /// - `BackendUnavailable` on non-timeout completion failures
    pub fn classify_zero_shot(
        &self,
        records: &[Record],
        text_field: TextField,
        template: &PromptTemplate,
    ) -> Result<Vec<ZeroShotPrediction>, PipelineError> {
        let prompts: Vec<String> = records
            .iter()
            .map(|record| {
                let speech = truncate_prefix(text_field.select(record), self.config.prefix_chars);
                template.render(speech)
            })
            .collect();

        let mut predictions = Vec::with_capacity(records.len());
        let batch_size = self.config.batch_size.max(1);

        for (batch_idx, (prompt_batch, record_batch)) in prompts
            .chunks(batch_size)
            .zip(records.chunks(batch_size))
            .enumerate()
        {
            let outputs = self.generate_with_retry(prompt_batch, batch_idx)?;
            debug_assert_eq!(outputs.len(), record_batch.len());

            for (record, raw_output) in record_batch.iter().zip(outputs) {
                let predicted = extract_label(&raw_output);
                predictions.push(ZeroShotPrediction {
                    record_id: record.id.clone(),
                    raw_output,
                    predicted,
                    true_label: record.label,
                });
            }
        }

        info!(
            "Zero-shot inference over {} records: {} unknown answer(s)",
            predictions.len(),
            predictions.iter().filter(|p| p.predicted.is_none()).count()
        );

        Ok(predictions)
    }

    /// Runs one batch, retrying once at half size on timeout. Sub-batches
    /// that still time out yield empty continuations.
    fn generate_with_retry(
        &self,
        prompts: &[String],
        batch_idx: usize,
    ) -> Result<Vec<String>, PipelineError> {
        match self.backend.generate(prompts, self.config.max_response_tokens) {
            Ok(outputs) => Ok(outputs),
            Err(CompletionError::Backend(msg)) => Err(PipelineError::BackendUnavailable(msg)),
            Err(CompletionError::Timeout(msg)) => {
                warn!(
                    "Batch {} timed out ({}); retrying at half batch size",
                    batch_idx, msg
                );
                let half = (prompts.len() / 2).max(1);
                let mut outputs = Vec::with_capacity(prompts.len());
                for sub_batch in prompts.chunks(half) {
                    match self.backend.generate(sub_batch, self.config.max_response_tokens) {
                        Ok(sub_outputs) => outputs.extend(sub_outputs),
                        Err(CompletionError::Backend(msg)) => {
                            return Err(PipelineError::BackendUnavailable(msg))
                        }
                        Err(CompletionError::Timeout(msg)) => {
                            warn!(
                                "Batch {} timed out again ({}); degrading {} prediction(s) to unknown",
                                batch_idx,
                                msg,
                                sub_batch.len()
                            );
                            outputs.extend(std::iter::repeat(String::new()).take(sub_batch.len()));
                        }
                    }
                }
                Ok(outputs)
            }
        }
    }
}

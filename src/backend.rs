use std::fmt;
use std::path::Path;

use log::error;
use ndarray::Array2;
use tokenizers::Tokenizer;

use crate::error::PipelineError;

/// Error surfaced by an external model capability.
#[derive(Debug)]
pub enum BackendError {
    /// The capability cannot be reached at all
    Unavailable(String),
    /// The capability was reached but the call failed
    Failure(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "backend unavailable: {}", msg),
            Self::Failure(msg) => write!(f, "backend failure: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        PipelineError::BackendUnavailable(err.to_string())
    }
}

/// Error surfaced by a text-completion capability.
#[derive(Debug)]
pub enum CompletionError {
    /// The batch did not complete within the capability's time budget
    Timeout(String),
    /// The capability cannot be reached or the call failed
    Backend(String),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(msg) => write!(f, "generation timed out: {}", msg),
            Self::Backend(msg) => write!(f, "completion backend error: {}", msg),
        }
    }
}

impl std::error::Error for CompletionError {}

/// A speech encoded for the trainable classifier: fixed-length token ids
/// plus the binary label. All other record fields are metadata and never
/// reach a model backend.
#[derive(Debug, Clone)]
pub struct EncodedExample {
    pub ids: Vec<u32>,
    pub label: u8,
}

/// External tokenization capability.
///
/// `encode` must return exactly `max_length` token ids, truncating or padding
/// as needed.
pub trait TextEncoder {
    fn encode(&self, text: &str, max_length: usize) -> Result<Vec<u32>, BackendError>;

    /// Persists the tokenizer configuration next to a trained model so the
    /// artifact directory is self-contained.
    fn save_config(&self, dir: &Path) -> Result<(), BackendError>;
}

/// External trainable binary classifier.
///
/// The harness owns call sequencing (fit, then predict) and checkpoint
/// retention; the backend owns optimization and device placement.
pub trait ClassifierBackend {
    type Handle;

    /// Creates a fresh untrained model configured for two classes.
    fn init(&self) -> Result<Self::Handle, BackendError>;

    /// Runs one optimization epoch over the training examples and returns
    /// the average training loss.
    fn fit_epoch(
        &self,
        handle: &mut Self::Handle,
        train: &[EncodedExample],
        learning_rate: f64,
        batch_size: usize,
        weight_decay: f64,
    ) -> Result<f64, BackendError>;

    /// Computes the evaluation loss over held-out examples without updating
    /// the model.
    fn evaluate(&self, handle: &Self::Handle, eval: &[EncodedExample]) -> Result<f64, BackendError>;

    /// Produces one row of class logits per encoded input, two columns.
    fn predict(
        &self,
        handle: &Self::Handle,
        inputs: &[Vec<u32>],
    ) -> Result<Array2<f32>, BackendError>;

    /// Persists the model state into `dir`.
    fn save(&self, handle: &Self::Handle, dir: &Path) -> Result<(), BackendError>;

    /// Restores a model state previously written by [`ClassifierBackend::save`].
    fn load(&self, dir: &Path) -> Result<Self::Handle, BackendError>;
}

/// External text-completion capability.
///
/// Emits at most `max_new_tokens` new tokens beyond each prompt. Called with
/// one batch of prompts at a time; implementations may parallelize inside a
/// batch but must return continuations in prompt order.
pub trait CompletionBackend {
    fn generate(
        &self,
        prompts: &[String],
        max_new_tokens: usize,
    ) -> Result<Vec<String>, CompletionError>;
}

/// [`TextEncoder`] backed by a Hugging Face `tokenizers` file.
pub struct HfTokenizerEncoder {
    tokenizer: Tokenizer,
    pad_id: u32,
}

impl HfTokenizerEncoder {
    /// Loads a tokenizer from a `tokenizer.json` file.
    ///
    /// # Errors
    /// - `Unavailable` if the file cannot be loaded
    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            error!("Failed to load tokenizer from {}: {}", path.display(), e);
            BackendError::Unavailable(format!("tokenizer {}: {}", path.display(), e))
        })?;
        Ok(Self {
            tokenizer,
            pad_id: 0,
        })
    }

    pub fn with_pad_id(mut self, pad_id: u32) -> Self {
        self.pad_id = pad_id;
        self
    }
}

impl TextEncoder for HfTokenizerEncoder {
    fn encode(&self, text: &str, max_length: usize) -> Result<Vec<u32>, BackendError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| BackendError::Failure(e.to_string()))?;

        let mut ids: Vec<u32> = encoding.get_ids().to_vec();
        ids.truncate(max_length);
        ids.resize(max_length, self.pad_id);
        Ok(ids)
    }

    fn save_config(&self, dir: &Path) -> Result<(), BackendError> {
        std::fs::create_dir_all(dir).map_err(|e| BackendError::Failure(e.to_string()))?;
        let path = dir.join("tokenizer.json");
        self.tokenizer
            .save(&path, false)
            .map_err(|e| BackendError::Failure(format!("saving {}: {}", path.display(), e)))?;
        Ok(())
    }
}

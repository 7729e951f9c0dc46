use std::path::PathBuf;

use log::{info, warn};
use ndarray::Array2;

use crate::backend::{ClassifierBackend, EncodedExample, TextEncoder};
use crate::data::{Record, TextField};
use crate::error::PipelineError;
use crate::metrics::{summarize, MetricsSummary, PredictionResult};

/// Configuration contract handed to the trainable-model capability.
///
/// The harness guarantees: evaluation runs once per epoch, the retained model
/// is the one with the lowest evaluation loss seen, and at most
/// `max_checkpoints` checkpoints exist on disk at any time.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub weight_decay: f64,
    /// Fixed encoded sequence length; longer speeches are truncated, shorter
    /// ones padded
    pub max_length: usize,
    /// Directory holding checkpoints and the selected-best model
    pub artifact_dir: PathBuf,
    pub max_checkpoints: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 2e-5,
            batch_size: 32,
            epochs: 3,
            weight_decay: 0.01,
            max_length: 512,
            artifact_dir: PathBuf::from("model_artifacts"),
            max_checkpoints: 2,
        }
    }
}

/// Summary of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// (train loss, eval loss) per epoch, in order
    pub epoch_losses: Vec<(f64, f64)>,
    /// Epoch with the lowest evaluation loss (0-indexed)
    pub best_epoch: usize,
    pub best_eval_loss: f64,
    /// False when the evaluation loss never decreased across epochs; this is
    /// logged as a warning, not raised as an error
    pub converged: bool,
}

/// Wraps a trainable binary text classifier: fit on a training partition,
/// predict on a held-out partition, compute metrics.
///
/// Gradient descent, tokenization internals, and device placement belong to
/// the injected capabilities; this type owns the experiment semantics around
/// them. `fit_and_evaluate` runs one fit at a time per harness.
pub struct ClassifierHarness<E, B> {
    encoder: E,
    backend: B,
    config: TrainingConfig,
}

impl<E: TextEncoder, B: ClassifierBackend> ClassifierHarness<E, B> {
    pub fn new(encoder: E, backend: B, config: TrainingConfig) -> Self {
        Self {
            encoder,
            backend,
            config,
        }
    }

    /// Fine-tunes on `train`, evaluates on `test`, and returns the trained
    /// model handle with its metrics and training report.
    ///
    /// The model state returned is the checkpoint with the lowest evaluation
    /// loss, not necessarily the final epoch's weights. Checkpoints are
    /// written under the artifact directory as `checkpoint-{epoch}` and
    /// pruned so only the best and the most recent survive; the selected-best
    /// model and the tokenizer configuration are additionally persisted
    /// under `best/`.
    ///
    /// # Errors
    /// - `Validation` if the configuration is unusable or a partition is empty
    /// - `BackendUnavailable` if the model or tokenization capability fails
    pub fn fit_and_evaluate(
        &self,
        train: &[Record],
        test: &[Record],
        text_field: TextField,
    ) -> Result<(B::Handle, MetricsSummary, TrainReport), PipelineError> {
        if self.config.epochs == 0 {
            return Err(PipelineError::Validation("epochs must be at least 1".into()));
        }
        if train.is_empty() || test.is_empty() {
            return Err(PipelineError::Validation(
                "train and test partitions must be non-empty".into(),
            ));
        }

        let encoded_train = self.encode_records(train, text_field)?;
        let encoded_test = self.encode_records(test, text_field)?;

        let mut handle = self.backend.init()?;
        let mut epoch_losses: Vec<(f64, f64)> = Vec::with_capacity(self.config.epochs);
        let mut best_epoch = 0usize;
        let mut best_eval_loss = f64::INFINITY;
        let mut retained: Vec<(usize, PathBuf)> = Vec::new();

        for epoch in 0..self.config.epochs {
            let train_loss = self.backend.fit_epoch(
                &mut handle,
                &encoded_train,
                self.config.learning_rate,
                self.config.batch_size,
                self.config.weight_decay,
            )?;
            // Evaluation cadence matches the checkpoint cadence: once per epoch.
            let eval_loss = self.backend.evaluate(&handle, &encoded_test)?;
            info!(
                "Epoch {}/{}: train loss {:.4}, eval loss {:.4}",
                epoch + 1,
                self.config.epochs,
                train_loss,
                eval_loss
            );
            epoch_losses.push((train_loss, eval_loss));

            if eval_loss < best_eval_loss {
                best_eval_loss = eval_loss;
                best_epoch = epoch;
            }

            let checkpoint_dir = self
                .config
                .artifact_dir
                .join(format!("checkpoint-{}", epoch));
            self.backend.save(&handle, &checkpoint_dir)?;
            retained.push((epoch, checkpoint_dir));
            self.prune_checkpoints(&mut retained, best_epoch)?;
        }

        let converged = self.config.epochs == 1
            || epoch_losses.windows(2).any(|w| w[1].1 < w[0].1);
        if !converged {
            warn!(
                "Convergence warning: evaluation loss never decreased over {} epochs",
                self.config.epochs
            );
        }

        // Restore the lowest-eval-loss state and persist it as the final model.
        let best_dir = self
            .config
            .artifact_dir
            .join(format!("checkpoint-{}", best_epoch));
        let best_handle = self.backend.load(&best_dir)?;
        let final_dir = self.config.artifact_dir.join("best");
        self.backend.save(&best_handle, &final_dir)?;
        self.encoder.save_config(&final_dir)?;

        let inputs: Vec<Vec<u32>> = encoded_test.iter().map(|e| e.ids.clone()).collect();
        let logits = self.backend.predict(&best_handle, &inputs)?;
        let predictions = logits_to_predictions(&logits, test)?;
        let summary = summarize(&predictions);

        info!(
            "Fine-tuned evaluation: accuracy {:.4}, weighted F1 {:?} (best epoch {})",
            summary.accuracy, summary.weighted_f1, best_epoch
        );

        Ok((
            best_handle,
            summary,
            TrainReport {
                epoch_losses,
                best_epoch,
                best_eval_loss,
                converged,
            },
        ))
    }

    fn encode_records(
        &self,
        records: &[Record],
        text_field: TextField,
    ) -> Result<Vec<EncodedExample>, PipelineError> {
        records
            .iter()
            .map(|record| {
                let ids = self
                    .encoder
                    .encode(text_field.select(record), self.config.max_length)?;
                Ok(EncodedExample {
                    ids,
                    label: record.label,
                })
            })
            .collect()
    }

    /// Keeps the best and the most recent checkpoint, deleting the rest.
    fn prune_checkpoints(
        &self,
        retained: &mut Vec<(usize, PathBuf)>,
        best_epoch: usize,
    ) -> Result<(), PipelineError> {
        let latest_epoch = retained.last().map(|(e, _)| *e).unwrap_or(0);
        let mut keep = Vec::new();
        for (epoch, dir) in retained.drain(..) {
            if epoch == best_epoch || epoch == latest_epoch {
                keep.push((epoch, dir));
            } else {
                std::fs::remove_dir_all(&dir)?;
            }
        }
        debug_assert!(keep.len() <= self.config.max_checkpoints);
        *retained = keep;
        Ok(())
    }
}

/// Argmax over the two class logits per row, paired back with each record.
fn logits_to_predictions(
    logits: &Array2<f32>,
    records: &[Record],
) -> Result<Vec<PredictionResult>, PipelineError> {
    if logits.nrows() != records.len() || logits.ncols() != 2 {
        return Err(PipelineError::Validation(format!(
            "expected {}x2 logits, got {}x{}",
            records.len(),
            logits.nrows(),
            logits.ncols()
        )));
    }

    Ok(records
        .iter()
        .zip(logits.rows())
        .map(|(record, row)| PredictionResult {
            record_id: record.id.clone(),
            predicted: Some(u8::from(row[1] > row[0])),
            true_label: record.label,
        })
        .collect())
}

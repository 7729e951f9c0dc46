use std::fmt;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::backend::{ClassifierBackend, CompletionBackend, TextEncoder};
use crate::classifier::ClassifierHarness;
use crate::data::{label_distribution, load_tsv, write_split_csv, write_zero_shot_csv, Dataset};
use crate::error::PipelineError;
use crate::metrics::{summarize, MetricsSummary, PredictionResult};
use crate::split::stratified_split;
use crate::task::{builtin_template, PromptLanguage, TaskConfig};
use crate::zeroshot::PromptInferenceEngine;

/// Stage of the per-task state machine, named in every fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Split,
    FineTune,
    ZeroShot(PromptLanguage),
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::Split => write!(f, "split"),
            Stage::FineTune => write!(f, "fine-tune"),
            Stage::ZeroShot(language) => write!(f, "zero-shot-{}", language.name()),
            Stage::Persist => write!(f, "persist"),
        }
    }
}

/// Re-wraps an error so its message names the task and the stage it occurred
/// at, keeping the original variant.
fn at_stage(task: &str, stage: Stage, err: PipelineError) -> PipelineError {
    let tag = |msg: String| format!("task {}, stage {}: {}", task, stage, msg);
    match err {
        PipelineError::DataIntegrity(msg) => PipelineError::DataIntegrity(tag(msg)),
        PipelineError::InsufficientData(msg) => PipelineError::InsufficientData(tag(msg)),
        PipelineError::BackendUnavailable(msg) => PipelineError::BackendUnavailable(tag(msg)),
        PipelineError::GenerationTimeout(msg) => PipelineError::GenerationTimeout(tag(msg)),
        PipelineError::Persistence(msg) => PipelineError::Persistence(tag(msg)),
        PipelineError::Validation(msg) => PipelineError::Validation(tag(msg)),
    }
}

/// Loads a task's dataset and produces its stratified partition, with fatal
/// errors naming the task and stage. Shared by [`ExperimentRunner::prepare`]
/// and the dataset-preparation binary.
pub fn load_and_split(config: &TaskConfig) -> Result<(Dataset, Dataset), PipelineError> {
    let task = config.task.name();

    let dataset = load_tsv(&config.input_path).map_err(|e| at_stage(task, Stage::Load, e))?;
    info!(
        "Task {}: {} records, label distribution {:?}",
        task,
        dataset.len(),
        label_distribution(&dataset)
    );

    stratified_split(&dataset, config.test_fraction, config.seed)
        .map_err(|e| at_stage(task, Stage::Split, e))
}

/// Outcome of the fine-tuned branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FineTuneOutcome {
    pub metrics: Option<MetricsSummary>,
    pub best_epoch: Option<usize>,
    pub converged: Option<bool>,
    /// Present when the branch failed; siblings keep running
    pub error: Option<String>,
}

/// Outcome of one zero-shot language branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroShotOutcome {
    pub language: PromptLanguage,
    pub metrics: Option<MetricsSummary>,
    pub unknown_answers: Option<usize>,
    pub error: Option<String>,
}

/// Everything a finished task run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task: String,
    pub train_size: usize,
    pub test_size: usize,
    pub fine_tune: Option<FineTuneOutcome>,
    pub zero_shot: Vec<ZeroShotOutcome>,
}

/// Orchestrates one task end to end:
/// split, fine-tune path, zero-shot paths, metrics, persisted artifacts.
///
/// The two tasks are independent and hold no shared mutable state; callers
/// may run two runners in parallel. Within a task, the fine-tune branch and
/// the two zero-shot language branches are independent terminal branches:
/// a failure in one is recorded in the report and never blocks the others.
pub struct ExperimentRunner<E, B, C> {
    harness: ClassifierHarness<E, B>,
    engine: PromptInferenceEngine<C>,
    config: TaskConfig,
}

impl<E, B, C> ExperimentRunner<E, B, C>
where
    E: TextEncoder,
    B: ClassifierBackend,
    C: CompletionBackend,
{
    pub fn new(
        harness: ClassifierHarness<E, B>,
        engine: PromptInferenceEngine<C>,
        config: TaskConfig,
    ) -> Self {
        Self {
            harness,
            engine,
            config,
        }
    }

    /// Loads the task's dataset and produces the stratified partition,
    /// persisting `train.csv` and `test.csv` under the output directory.
    ///
    /// Persistence failures are reported but do not abort the task; the
    /// partition is still returned.
    ///
    /// # Errors
    /// - `DataIntegrity`, `InsufficientData`, `Validation` are fatal for the
    ///   task and name the failing stage
    pub fn prepare(&self) -> Result<(Dataset, Dataset), PipelineError> {
        let task = self.config.task.name();
        let (train, test) = load_and_split(&self.config)?;

        for (name, partition) in [("train.csv", &train), ("test.csv", &test)] {
            let path = self.config.output_dir.join(name);
            if let Err(e) = write_split_csv(partition, &path) {
                error!("{}", at_stage(task, Stage::Persist, e));
            }
        }

        Ok((train, test))
    }

    /// Runs every branch of the task and persists a `metrics.json` summary.
    ///
    /// Only load and split failures are fatal; branch failures are captured
    /// inside the returned report, and already-computed metrics survive any
    /// persistence failure.
    pub fn run(&self) -> Result<TaskReport, PipelineError> {
        let task = self.config.task.name();
        let (train, test) = self.prepare()?;

        let fine_tune = self.run_fine_tune(&train, &test);
        let zero_shot = vec![
            self.run_zero_shot(&test, PromptLanguage::Turkish),
            self.run_zero_shot(&test, PromptLanguage::English),
        ];

        let report = TaskReport {
            task: task.to_string(),
            train_size: train.len(),
            test_size: test.len(),
            fine_tune: Some(fine_tune),
            zero_shot,
        };

        let metrics_path = self.config.output_dir.join("metrics.json");
        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&metrics_path, json) {
                    error!(
                        "{}",
                        at_stage(task, Stage::Persist, PipelineError::Persistence(e.to_string()))
                    );
                }
            }
            Err(e) => error!(
                "{}",
                at_stage(task, Stage::Persist, PipelineError::Persistence(e.to_string()))
            ),
        }

        Ok(report)
    }

    fn run_fine_tune(&self, train: &Dataset, test: &Dataset) -> FineTuneOutcome {
        let task = self.config.task.name();
        let text_field = self.config.task.finetune_field();

        match self.harness.fit_and_evaluate(train, test, text_field) {
            Ok((_handle, metrics, report)) => {
                info!(
                    "Task {}: fine-tuned accuracy {:.4}, weighted F1 {:?}",
                    task, metrics.accuracy, metrics.weighted_f1
                );
                FineTuneOutcome {
                    metrics: Some(metrics),
                    best_epoch: Some(report.best_epoch),
                    converged: Some(report.converged),
                    error: None,
                }
            }
            Err(e) => {
                let e = at_stage(task, Stage::FineTune, e);
                error!("{}", e);
                FineTuneOutcome {
                    metrics: None,
                    best_epoch: None,
                    converged: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn run_zero_shot(&self, test: &Dataset, language: PromptLanguage) -> ZeroShotOutcome {
        let task = self.config.task.name();
        let template = builtin_template(self.config.task, language);
        let text_field = language.text_field();

        let predictions =
            match self
                .engine
                .classify_zero_shot(test, text_field, &template)
            {
                Ok(predictions) => predictions,
                Err(e) => {
                    let e = at_stage(task, Stage::ZeroShot(language), e);
                    error!("{}", e);
                    return ZeroShotOutcome {
                        language,
                        metrics: None,
                        unknown_answers: None,
                        error: Some(e.to_string()),
                    };
                }
            };

        let results: Vec<PredictionResult> =
            predictions.iter().map(|p| p.as_result()).collect();
        let metrics = summarize(&results);
        let unknown_answers = predictions.iter().filter(|p| p.predicted.is_none()).count();
        info!(
            "Task {}: zero-shot ({}) accuracy {:.4}, {} unknown",
            task,
            language.name(),
            metrics.accuracy,
            unknown_answers
        );

        let raw: Vec<String> = predictions.iter().map(|p| p.raw_output.clone()).collect();
        let extracted: Vec<Option<u8>> = predictions.iter().map(|p| p.predicted).collect();
        let csv_path = self
            .config
            .output_dir
            .join(format!("zeroshot_{}.csv", language.name()));
        if let Err(e) = write_zero_shot_csv(test, &raw, &extracted, &csv_path) {
            // Reported only; the computed metrics stay valid.
            error!("{}", at_stage(task, Stage::ZeroShot(language), e));
        }

        ZeroShotOutcome {
            language,
            metrics: Some(metrics),
            unknown_answers: Some(unknown_answers),
            error: None,
        }
    }
}

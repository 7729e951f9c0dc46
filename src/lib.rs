//! Experiment pipeline comparing a fine-tuned encoder classifier against a
//! zero-shot prompted generative model on two binary classification tasks
//! over parliamentary speeches: ideological orientation (left vs right) and
//! governing power (governing vs opposition).
//!
//! The crate owns the experiment semantics: stratified dataset partitioning,
//! the train/evaluate harness around a supervised classifier, and the
//! zero-shot harness that turns free-form generated text into a binary
//! label. Model internals are collaborator capabilities behind the traits in
//! [`backend`]; bring your own implementations or use the bundled
//! `tokenizers`-backed encoder.
//!
//! # Basic usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use parlabench::{
//!     ClassifierHarness, EngineConfig, ExperimentRunner, PromptInferenceEngine,
//!     Task, TaskConfig, TrainingConfig,
//! };
//! # use parlabench::backend::{BackendError, ClassifierBackend, CompletionBackend,
//! #     CompletionError, EncodedExample, TextEncoder};
//! # use ndarray::Array2;
//! # struct MyEncoder; struct MyClassifier; struct MyLlm;
//! # impl TextEncoder for MyEncoder {
//! #     fn encode(&self, _: &str, n: usize) -> Result<Vec<u32>, BackendError> { Ok(vec![0; n]) }
//! #     fn save_config(&self, _: &std::path::Path) -> Result<(), BackendError> { Ok(()) }
//! # }
//! # impl ClassifierBackend for MyClassifier {
//! #     type Handle = ();
//! #     fn init(&self) -> Result<(), BackendError> { Ok(()) }
//! #     fn fit_epoch(&self, _: &mut (), _: &[EncodedExample], _: f64, _: usize, _: f64)
//! #         -> Result<f64, BackendError> { Ok(0.0) }
//! #     fn evaluate(&self, _: &(), _: &[EncodedExample]) -> Result<f64, BackendError> { Ok(0.0) }
//! #     fn predict(&self, _: &(), inputs: &[Vec<u32>]) -> Result<Array2<f32>, BackendError> {
//! #         Ok(Array2::zeros((inputs.len(), 2)))
//! #     }
//! #     fn save(&self, _: &(), _: &std::path::Path) -> Result<(), BackendError> { Ok(()) }
//! #     fn load(&self, _: &std::path::Path) -> Result<(), BackendError> { Ok(()) }
//! # }
//! # impl CompletionBackend for MyLlm {
//! #     fn generate(&self, prompts: &[String], _: usize) -> Result<Vec<String>, CompletionError> {
//! #         Ok(prompts.iter().map(|_| "0".to_string()).collect())
//! #     }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TaskConfig::new(
//!     Task::Orientation,
//!     PathBuf::from("data/orientation.tsv"),
//!     PathBuf::from("results/orientation"),
//! );
//!
//! let harness = ClassifierHarness::new(MyEncoder, MyClassifier, TrainingConfig::default());
//! let engine = PromptInferenceEngine::new(MyLlm, EngineConfig::default());
//! let runner = ExperimentRunner::new(harness, engine, config);
//!
//! let report = runner.run()?;
//! println!("fine-tuned: {:?}", report.fine_tune);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod classifier;
pub mod data;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod split;
pub mod task;
pub mod zeroshot;

pub use backend::{ClassifierBackend, CompletionBackend, HfTokenizerEncoder, TextEncoder};
pub use classifier::{ClassifierHarness, TrainReport, TrainingConfig};
pub use data::{Dataset, Record, TextField};
pub use error::PipelineError;
pub use metrics::{summarize, MetricsSummary, PredictionResult};
pub use runner::{load_and_split, ExperimentRunner, Stage, TaskReport};
pub use split::stratified_split;
pub use task::{builtin_template, PromptLanguage, Task, TaskConfig};
pub use zeroshot::{extract_label, EngineConfig, PromptInferenceEngine, PromptTemplate};

pub fn init_logger() {
    env_logger::init();
}

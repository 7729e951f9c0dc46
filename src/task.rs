use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::TextField;
use crate::error::PipelineError;
use crate::zeroshot::PromptTemplate;

/// The two binary classification tasks evaluated on parliamentary speeches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// Ideological orientation of the speaker's party: 0 = left, 1 = right
    Orientation,
    /// Relation to executive power: 0 = governing, 1 = opposition
    Power,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Orientation => "orientation",
            Task::Power => "power",
        }
    }

    /// Text field the fine-tuned classifier trains on. Orientation uses the
    /// source-language speech, power the English translation; the asymmetry
    /// is intentional.
    pub fn finetune_field(&self) -> TextField {
        match self {
            Task::Orientation => TextField::Original,
            Task::Power => TextField::Translated,
        }
    }
}

/// Language variant of a zero-shot prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptLanguage {
    Turkish,
    English,
}

impl PromptLanguage {
    pub fn name(&self) -> &'static str {
        match self {
            PromptLanguage::Turkish => "turkish",
            PromptLanguage::English => "english",
        }
    }

    /// Text field fed into prompts of this language.
    pub fn text_field(&self) -> TextField {
        match self {
            PromptLanguage::Turkish => TextField::Original,
            PromptLanguage::English => TextField::Translated,
        }
    }
}

/// Built-in prompt template for a (task, language) pairing.
///
/// Every template instructs the model to answer with one of the two category
/// tokens "0" or "1" and binds exactly one placeholder to the truncated
/// speech text.
pub fn builtin_template(task: Task, language: PromptLanguage) -> PromptTemplate {
    let text = match (task, language) {
        (Task::Orientation, PromptLanguage::English) => {
            "The following is a speech delivered in the Turkish parliament. \
             Decide whether the speaker's party is left-leaning or right-leaning. \
             Answer only with 0 for left or 1 for right.\n\
             Speech: {speech}\nAnswer:"
        }
        (Task::Orientation, PromptLanguage::Turkish) => {
            "Asagidaki konusma Turkiye Buyuk Millet Meclisi'nde yapilmistir. \
             Konusmacinin partisinin sol mu yoksa sag mi egilimli oldugunu belirle. \
             Sadece 0 (sol) veya 1 (sag) ile cevap ver.\n\
             Konusma: {speech}\nCevap:"
        }
        (Task::Power, PromptLanguage::English) => {
            "The following is a speech delivered in the Turkish parliament. \
             Decide whether the speaker's party is currently governing or in opposition. \
             Answer only with 0 for governing or 1 for opposition.\n\
             Speech: {speech}\nAnswer:"
        }
        (Task::Power, PromptLanguage::Turkish) => {
            "Asagidaki konusma Turkiye Buyuk Millet Meclisi'nde yapilmistir. \
             Konusmacinin partisinin iktidarda mi yoksa muhalefette mi oldugunu belirle. \
             Sadece 0 (iktidar) veya 1 (muhalefet) ile cevap ver.\n\
             Konusma: {speech}\nCevap:"
        }
    };
    // Built-in templates carry exactly one placeholder by construction.
    PromptTemplate::new(text).expect("builtin template is valid")
}

/// Per-task experiment parameters. One runner, two parameterizations; the
/// tasks share orchestration but differ in label semantics, text-field
/// selection, and output locations.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub task: Task,
    /// TSV input file for this task
    pub input_path: PathBuf,
    /// Directory receiving split files, result files, and metrics
    pub output_dir: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
}

impl TaskConfig {
    pub fn new(task: Task, input_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            task,
            input_path,
            output_dir,
            test_fraction: 0.1,
            seed: 42,
        }
    }

    pub fn with_test_fraction(mut self, test_fraction: f64) -> Result<Self, PipelineError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(PipelineError::Validation(format!(
                "test_fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }
        self.test_fraction = test_fraction;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use parlabench::backend::{
    BackendError, ClassifierBackend, CompletionBackend, CompletionError, EncodedExample,
    TextEncoder,
};
use parlabench::{
    ClassifierHarness, EngineConfig, ExperimentRunner, PromptInferenceEngine, Task, TaskConfig,
    TextField, TrainingConfig,
};

/// Encoder that hashes characters into a fixed-length id sequence.
struct StubEncoder;

impl TextEncoder for StubEncoder {
    fn encode(&self, text: &str, max_length: usize) -> Result<Vec<u32>, BackendError> {
        let mut ids: Vec<u32> = text.chars().take(max_length).map(|c| c as u32).collect();
        ids.resize(max_length, 0);
        Ok(ids)
    }

    fn save_config(&self, dir: &Path) -> Result<(), BackendError> {
        std::fs::create_dir_all(dir).map_err(|e| BackendError::Failure(e.to_string()))?;
        std::fs::write(dir.join("tokenizer.json"), "{}")
            .map_err(|e| BackendError::Failure(e.to_string()))
    }
}

/// Classifier capability with scripted per-epoch evaluation losses and
/// on-disk state snapshots.
struct ScriptedClassifier {
    eval_losses: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScriptedHandle {
    epochs_trained: usize,
}

impl ClassifierBackend for ScriptedClassifier {
    type Handle = ScriptedHandle;

    fn init(&self) -> Result<Self::Handle, BackendError> {
        Ok(ScriptedHandle { epochs_trained: 0 })
    }

    fn fit_epoch(
        &self,
        handle: &mut Self::Handle,
        _train: &[EncodedExample],
        _learning_rate: f64,
        _batch_size: usize,
        _weight_decay: f64,
    ) -> Result<f64, BackendError> {
        handle.epochs_trained += 1;
        Ok(1.0 / handle.epochs_trained as f64)
    }

    fn evaluate(
        &self,
        handle: &Self::Handle,
        _eval: &[EncodedExample],
    ) -> Result<f64, BackendError> {
        Ok(self.eval_losses[handle.epochs_trained - 1])
    }

    fn predict(
        &self,
        _handle: &Self::Handle,
        inputs: &[Vec<u32>],
    ) -> Result<Array2<f32>, BackendError> {
        // Always predicts class 1.
        let mut logits = Array2::zeros((inputs.len(), 2));
        for mut row in logits.rows_mut() {
            row[1] = 1.0;
        }
        Ok(logits)
    }

    fn save(&self, handle: &Self::Handle, dir: &Path) -> Result<(), BackendError> {
        std::fs::create_dir_all(dir).map_err(|e| BackendError::Failure(e.to_string()))?;
        std::fs::write(dir.join("state"), handle.epochs_trained.to_string())
            .map_err(|e| BackendError::Failure(e.to_string()))
    }

    fn load(&self, dir: &Path) -> Result<Self::Handle, BackendError> {
        let state = std::fs::read_to_string(dir.join("state"))
            .map_err(|e| BackendError::Failure(e.to_string()))?;
        let epochs_trained = state
            .parse()
            .map_err(|e| BackendError::Failure(format!("corrupt state: {}", e)))?;
        Ok(ScriptedHandle { epochs_trained })
    }
}

/// Completion capability answering every prompt with a fixed continuation.
struct FixedCompletion {
    answer: &'static str,
}

impl CompletionBackend for FixedCompletion {
    fn generate(
        &self,
        prompts: &[String],
        _max_new_tokens: usize,
    ) -> Result<Vec<String>, CompletionError> {
        Ok(prompts.iter().map(|_| self.answer.to_string()).collect())
    }
}

fn write_task_tsv(dir: &Path, task: Task, ones: usize, zeros: usize) -> PathBuf {
    let path = dir.join(format!("{}.tsv", task.name()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "id\tspeaker\tsex\ttext\ttext_en\tlabel").unwrap();
    for i in 0..ones {
        writeln!(
            file,
            "one-{}\tSpeaker A\tF\tuzun bir konusma metni {}\ta long speech text {}\t1",
            i, i, i
        )
        .unwrap();
    }
    for i in 0..zeros {
        writeln!(
            file,
            "zero-{}\tSpeaker B\tM\tbaska bir konusma {}\tanother speech {}\t0",
            i, i, i
        )
        .unwrap();
    }
    path
}

fn count_checkpoints(artifact_dir: &Path) -> usize {
    std::fs::read_dir(artifact_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("checkpoint-")
        })
        .count()
}

#[test]
fn checkpoint_retention_keeps_best_model() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_task_tsv(dir.path(), Task::Orientation, 20, 20);
    let dataset = parlabench::data::load_tsv(&input).unwrap();
    let (train, test) = parlabench::stratified_split(&dataset, 0.2, 42).unwrap();

    let artifact_dir = dir.path().join("artifacts");
    let config = TrainingConfig {
        epochs: 3,
        artifact_dir: artifact_dir.clone(),
        ..TrainingConfig::default()
    };
    // Eval loss dips at the second epoch and rises again: the best model is
    // not the final epoch's weights.
    let backend = ScriptedClassifier {
        eval_losses: vec![0.9, 0.5, 0.7],
    };
    let harness = ClassifierHarness::new(StubEncoder, backend, config);

    let (handle, _metrics, report) = harness
        .fit_and_evaluate(&train, &test, TextField::Original)
        .unwrap();

    assert_eq!(report.best_epoch, 1);
    assert!((report.best_eval_loss - 0.5).abs() < 1e-9);
    assert!(report.converged);

    // After 3 epochs, at most 2 checkpoints remain on disk.
    assert!(count_checkpoints(&artifact_dir) <= 2);
    // The retained model is the epoch-1 state (2 epochs of training), and
    // the selected-best artifact matches it.
    assert_eq!(handle.epochs_trained, 2);
    let best_state = std::fs::read_to_string(artifact_dir.join("best/state")).unwrap();
    assert_eq!(best_state, "2");
    // Tokenizer configuration sits next to the final model.
    assert!(artifact_dir.join("best/tokenizer.json").exists());
}

#[test]
fn non_decreasing_loss_flags_convergence_warning() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_task_tsv(dir.path(), Task::Orientation, 10, 10);
    let dataset = parlabench::data::load_tsv(&input).unwrap();
    let (train, test) = parlabench::stratified_split(&dataset, 0.2, 42).unwrap();

    let config = TrainingConfig {
        epochs: 3,
        artifact_dir: dir.path().join("artifacts"),
        ..TrainingConfig::default()
    };
    let backend = ScriptedClassifier {
        eval_losses: vec![0.5, 0.6, 0.7],
    };
    let harness = ClassifierHarness::new(StubEncoder, backend, config);

    let (_, _, report) = harness
        .fit_and_evaluate(&train, &test, TextField::Original)
        .unwrap();

    assert!(!report.converged);
    assert_eq!(report.best_epoch, 0);
}

#[test]
fn runner_produces_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_task_tsv(dir.path(), Task::Power, 60, 40);
    let output_dir = dir.path().join("results/power");

    let config = TaskConfig::new(Task::Power, input, output_dir.clone());
    let training = TrainingConfig {
        epochs: 2,
        artifact_dir: output_dir.join("model"),
        ..TrainingConfig::default()
    };
    let harness = ClassifierHarness::new(
        StubEncoder,
        ScriptedClassifier {
            eval_losses: vec![0.8, 0.4],
        },
        training,
    );
    let engine = PromptInferenceEngine::new(
        FixedCompletion { answer: "Answer: 1" },
        EngineConfig::default(),
    );

    let report = ExperimentRunner::new(harness, engine, config).run().unwrap();

    // 100 records, f = 0.1, seed = 42: stratified test set of 10 (6 ones).
    assert_eq!(report.test_size, 10);
    assert_eq!(report.train_size, 90);

    let fine_tune = report.fine_tune.unwrap();
    assert!(fine_tune.error.is_none());
    // The scripted classifier always predicts 1 and the test stratum holds
    // 6 ones out of 10.
    let metrics = fine_tune.metrics.unwrap();
    assert!((metrics.accuracy - 0.6).abs() < 1e-9);

    // Both language branches ran and extracted "1" from every continuation.
    assert_eq!(report.zero_shot.len(), 2);
    for branch in &report.zero_shot {
        assert!(branch.error.is_none());
        let metrics = branch.metrics.as_ref().unwrap();
        assert!((metrics.accuracy - 0.6).abs() < 1e-9);
        assert_eq!(branch.unknown_answers, Some(0));
    }

    // Persisted artifacts: splits, per-language results, metrics summary.
    assert!(output_dir.join("train.csv").exists());
    assert!(output_dir.join("test.csv").exists());
    assert!(output_dir.join("zeroshot_turkish.csv").exists());
    assert!(output_dir.join("zeroshot_english.csv").exists());
    assert!(output_dir.join("metrics.json").exists());
    assert!(output_dir.join("model/best/state").exists());
}

#[test]
fn failing_completion_backend_does_not_block_fine_tune() {
    struct DownCompletion;
    impl CompletionBackend for DownCompletion {
        fn generate(
            &self,
            _prompts: &[String],
            _max_new_tokens: usize,
        ) -> Result<Vec<String>, CompletionError> {
            Err(CompletionError::Backend("connection refused".into()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let input = write_task_tsv(dir.path(), Task::Orientation, 30, 30);
    let output_dir = dir.path().join("results/orientation");

    let config = TaskConfig::new(Task::Orientation, input, output_dir);
    let training = TrainingConfig {
        epochs: 1,
        artifact_dir: dir.path().join("model"),
        ..TrainingConfig::default()
    };
    let harness = ClassifierHarness::new(
        StubEncoder,
        ScriptedClassifier {
            eval_losses: vec![0.3],
        },
        training,
    );
    let engine = PromptInferenceEngine::new(DownCompletion, EngineConfig::default());

    let report = ExperimentRunner::new(harness, engine, config).run().unwrap();

    // Zero-shot branches failed and say where; the fine-tune branch still ran.
    assert!(report.fine_tune.unwrap().error.is_none());
    for branch in &report.zero_shot {
        let message = branch.error.as_ref().unwrap();
        assert!(message.contains("task orientation"));
        assert!(message.contains("zero-shot"));
    }
}

#[test]
fn truncated_speech_through_template_extracts_answer() {
    // A record whose translation is far longer than the 500-character bound,
    // with a scripted continuation of "Answer: 1".
    let long_speech = "word ".repeat(300);
    let records = vec![parlabench::Record {
        id: "s1".into(),
        speaker: "Speaker".into(),
        sex: "F".into(),
        text: "kaynak".into(),
        text_en: long_speech,
        label: 1,
    }];

    let engine = PromptInferenceEngine::new(
        FixedCompletion { answer: "Answer: 1" },
        EngineConfig::default(),
    );
    let template = parlabench::builtin_template(
        Task::Power,
        parlabench::PromptLanguage::English,
    );

    let predictions = engine
        .classify_zero_shot(&records, TextField::Translated, &template)
        .unwrap();
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].predicted, Some(1));
    assert_eq!(predictions[0].raw_output, "Answer: 1");
}

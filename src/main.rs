use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;

use parlabench::data::{label_distribution, write_split_csv};
use parlabench::{load_and_split, Task, TaskConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TaskArg {
    Orientation,
    Power,
    Both,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding <task>.tsv input files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory receiving per-task split files
    #[arg(short, long, default_value = "results")]
    output_dir: PathBuf,

    /// Which task(s) to prepare
    #[arg(short, long, value_enum, default_value_t = TaskArg::Both)]
    task: TaskArg,

    /// Fraction of each label stratum sampled into the test set
    #[arg(long, default_value_t = 0.1)]
    test_fraction: f64,

    /// Seed for the deterministic stratified split
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let tasks: Vec<Task> = match args.task {
        TaskArg::Orientation => vec![Task::Orientation],
        TaskArg::Power => vec![Task::Power],
        TaskArg::Both => vec![Task::Orientation, Task::Power],
    };

    info!("=== Preparing dataset splits for {} task(s) ===", tasks.len());

    // The tasks are fully independent; run them on separate blocking threads.
    let mut handles = Vec::new();
    for task in tasks {
        let config = TaskConfig::new(
            task,
            args.data_dir.join(format!("{}.tsv", task.name())),
            args.output_dir.join(task.name()),
        )
        .with_test_fraction(args.test_fraction)?
        .with_seed(args.seed);

        handles.push(tokio::task::spawn_blocking(move || prepare_task(config)));
    }

    for handle in handles {
        handle.await??;
    }

    info!("=== Done ===");
    Ok(())
}

fn prepare_task(config: TaskConfig) -> anyhow::Result<()> {
    let task = config.task;
    info!("Task {}: loading {}", task.name(), config.input_path.display());

    let (train, test) = load_and_split(&config)
        .with_context(|| format!("preparing task {}", task.name()))?;

    for (name, partition) in [("train.csv", &train), ("test.csv", &test)] {
        let path = config.output_dir.join(name);
        write_split_csv(partition, &path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(
            "Task {}: wrote {} ({} records, labels {:?})",
            task.name(),
            path.display(),
            partition.len(),
            label_distribution(partition)
        );
    }

    println!(
        "{}: {} train / {} test records prepared under {}",
        task.name(),
        train.len(),
        test.len(),
        config.output_dir.display()
    );
    Ok(())
}

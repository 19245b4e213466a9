use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use orrery_io::{ExperimentName, LabelProbability, PredictionRecord, ResultWriter, TableReader};
use orrery_pipeline::{DISPOSITION_LABELS, PipelineConfig, TrainedPipeline, run};

#[derive(Parser)]
#[command(name = "orrery")]
#[command(about = "Exoplanet disposition classification with a stacked ensemble")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Log convergence and degraded-metric warnings at debug level
    #[arg(long, global = true)]
    suppress_warnings: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Train, cross-validate and evaluate the stacked classifier
    Train {
        /// Path to the input CSV file
        #[arg(long)]
        data: PathBuf,

        /// Name of the target label column
        #[arg(long, default_value = "disposition")]
        target: String,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Number of diagnostic cross-validation folds
        #[arg(long, default_value_t = 5)]
        cv_folds: usize,

        /// Fraction of rows held out for evaluation
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,

        /// Number of trees in the Random Forest
        #[arg(long, default_value_t = 100)]
        n_trees: usize,

        /// Number of AdaBoost rounds
        #[arg(long, default_value_t = 100)]
        n_estimators: usize,

        /// Iteration cap for the logistic meta learner
        #[arg(long, default_value_t = 500)]
        meta_max_iter: usize,

        /// Artifact path (defaults to {output_dir}/{experiment}_model.bin)
        #[arg(long)]
        artifact: Option<PathBuf>,
    },

    /// Predict dispositions for new rows with a saved pipeline
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the input CSV file
        #[arg(long)]
        data: PathBuf,

        /// Experiment name for output files
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Number of top-k labels to output per row
        #[arg(long, default_value_t = 3)]
        top_k: usize,

        /// Column used as the row identifier (row index if absent)
        #[arg(long)]
        id_column: Option<String>,

        /// Fail unless the model's class order matches the disposition
        /// serving map
        #[arg(long, default_value_t = false)]
        check_disposition_order: bool,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    experiment: String,
    classes: Vec<String>,
    n_test: usize,
    accuracy: f64,
    f1_score: f64,
    cv_mean_accuracy: Option<f64>,
    cv_std_accuracy: Option<f64>,
    auc_omissions: usize,
    dropped_columns: Vec<String>,
    engineered: Vec<String>,
    artifact: Option<PathBuf>,
}

#[derive(Serialize)]
struct PredictOutput {
    experiment: String,
    n_rows: usize,
    classes: Vec<String>,
    n_features: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            target,
            experiment,
            output_dir,
            cv_folds,
            test_fraction,
            n_trees,
            n_estimators,
            meta_max_iter,
            artifact,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let artifact = artifact.unwrap_or_else(|| writer.model_path());

            let config = PipelineConfig::new()
                .with_target(target)
                .with_random_seed(cli.seed)
                .with_suppress_warnings(cli.suppress_warnings)
                .with_cv_folds(cv_folds)
                .with_test_fraction(test_fraction)
                .with_n_trees(n_trees)
                .with_n_estimators(n_estimators)
                .with_meta_max_iter(meta_max_iter)
                .with_artifact_path(Some(artifact));

            let outcome = run(&config, &data).context("training pipeline failed")?;
            let report = &outcome.report;

            writer.write_evaluation(report)?;
            writer.write_test_predictions(&outcome.held_out.labels, &report.predictions)?;

            let output = TrainOutput {
                experiment,
                classes: report.classes.clone(),
                n_test: report.n_test,
                accuracy: report.accuracy,
                f1_score: report.f1_score,
                cv_mean_accuracy: report.cv.as_ref().map(|cv| cv.mean_accuracy),
                cv_std_accuracy: report.cv.as_ref().map(|cv| cv.std_accuracy),
                auc_omissions: report.auc_omissions.len(),
                dropped_columns: outcome.dropped.iter().map(|d| d.name.clone()).collect(),
                engineered: outcome.engineered.clone(),
                artifact: outcome.artifact_path.clone(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            data,
            experiment,
            output_dir,
            top_k,
            id_column,
            check_disposition_order,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            // 1. Load model
            let pipeline = TrainedPipeline::load(&model).context("failed to load model")?;
            info!(classes = ?pipeline.classes().labels(), "model loaded");
            if check_disposition_order {
                pipeline
                    .classes()
                    .verify_order(&DISPOSITION_LABELS)
                    .context("model class order does not match the serving map")?;
            }

            // 2. Read rows
            let table = TableReader::new(&data)
                .read()
                .context("failed to read input CSV")?;
            info!(n_rows = table.n_rows(), "rows loaded");

            // 3. Predict
            let distributions = pipeline.predict_proba(&table).context("prediction failed")?;

            // 4. Build prediction records
            let ids: Vec<String> = match id_column.as_deref() {
                Some(name) => match table.column(name) {
                    Some(column) => column
                        .data()
                        .to_text()
                        .into_iter()
                        .enumerate()
                        .map(|(i, id)| id.unwrap_or_else(|| i.to_string()))
                        .collect(),
                    None => {
                        warn!(column = name, "id column absent, using row indices");
                        (0..table.n_rows()).map(|i| i.to_string()).collect()
                    }
                },
                None => (0..table.n_rows()).map(|i| i.to_string()).collect(),
            };
            let label = |class: usize| {
                pipeline
                    .classes()
                    .decode(class)
                    .unwrap_or_default()
                    .to_string()
            };
            let predictions: Vec<PredictionRecord> = ids
                .into_iter()
                .zip(&distributions)
                .map(|(id, dist)| {
                    let predicted = dist.predicted_class();
                    PredictionRecord {
                        id,
                        predicted: label(predicted),
                        probability: dist.probability(predicted),
                        top_k: dist
                            .top_k(top_k)
                            .into_iter()
                            .map(|(class, probability)| LabelProbability {
                                label: label(class),
                                probability,
                            })
                            .collect(),
                    }
                })
                .collect();

            // 5. Write predictions JSON
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            writer.write_predictions(&predictions)?;

            // 6. Print summary
            let output = PredictOutput {
                experiment,
                n_rows: predictions.len(),
                classes: pipeline.classes().labels().to_vec(),
                n_features: pipeline.preprocessor().n_features_out(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

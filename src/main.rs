use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod classifier;
mod config;
mod data;
mod error;
mod features;
mod forest;
mod labeler;
mod metrics;
mod models;
mod report;
mod synth;
mod tree;

use classifier::{Prediction, TrainingRun};
use config::{ForestConfig, PipelineConfig, SplitConfig, WindowConfig};
use models::{Attempt, StudentFeatures};

#[derive(Parser)]
#[command(name = "persona-diagnostics")]
#[command(about = "Exam attempt diagnostics and learning persona classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct TrainingArgs {
    /// Event log CSV (falls back to DIAGNOSTIC_DATA)
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Seed for the evaluation split and the forest
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 0.2)]
    eval_fraction: f64,
    #[arg(long, default_value_t = 100)]
    trees: usize,
    #[arg(long, default_value_t = 12)]
    max_depth: usize,
    /// Number of tests in each improvement window
    #[arg(long, default_value_t = 3)]
    window_size: u32,
    /// Total number of tests in the log (GT_01..GT_N)
    #[arg(long, default_value_t = 10)]
    tests: u32,
}

impl TrainingArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            window: WindowConfig::edges(self.tests, self.window_size),
            split: SplitConfig {
                eval_fraction: self.eval_fraction,
                seed: self.seed,
            },
            forest: ForestConfig {
                n_trees: self.trees,
                max_depth: self.max_depth,
                seed: self.seed,
                ..ForestConfig::default()
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic event log
    Generate {
        #[arg(long, default_value = config::DEFAULT_DATA_PATH)]
        out: PathBuf,
        #[arg(long, default_value_t = 50)]
        students: u32,
        #[arg(long, default_value_t = 10)]
        tests: u32,
        #[arg(long, default_value_t = 30)]
        questions_per_subject: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Label students, train the classifier and print the held-out evaluation
    Train {
        #[command(flatten)]
        training: TrainingArgs,
        #[arg(long)]
        json: bool,
    },
    /// Train, then diagnose a profile from five summary values:
    /// formula, concept, hard, integer accuracy and improvement
    Predict {
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<f64>,
        #[command(flatten)]
        training: TrainingArgs,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown report for one student and/or the whole cohort
    Diagnose {
        #[arg(long)]
        student: Option<String>,
        /// Include the class-wide persona overview
        #[arg(long)]
        cohort: bool,
        /// Tests in each window of the report's improvement slope
        #[arg(long, default_value_t = 2)]
        report_window: u32,
        #[command(flatten)]
        training: TrainingArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Train, then write the class-wide persona overview
    Cohort {
        #[command(flatten)]
        training: TrainingArgs,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

struct Pipeline {
    attempts: Vec<Attempt>,
    table: Vec<StudentFeatures>,
    run: TrainingRun,
}

fn load(csv: Option<PathBuf>) -> anyhow::Result<Vec<Attempt>> {
    let path = config::resolve_data_path(csv);
    data::load_attempts(&path)
        .with_context(|| format!("failed to load event log from {}", path.display()))
}

fn run_pipeline(training: &TrainingArgs) -> anyhow::Result<Pipeline> {
    let config = training.pipeline_config();
    config.validate().context("invalid pipeline configuration")?;

    let attempts = load(training.csv.clone())?;
    let table = features::extract_all(&attempts, &config.window);
    let students = classifier::label_students(&table);
    info!(students = students.len(), "labeled students");

    let run = classifier::train(&students, &config.split, &config.forest)
        .context("training failed")?;

    Ok(Pipeline {
        attempts,
        table,
        run,
    })
}

fn print_prediction(prediction: &Prediction) {
    println!("--- Diagnostic Result ---");
    println!("Predicted Category: {}", prediction.label);
    let levels: Vec<String> = prediction
        .confidence
        .iter()
        .map(|(persona, p)| format!("{}: {:.1}%", persona, p * 100.0))
        .collect();
    println!("Confidence Levels: {{{}}}", levels.join(", "));
}

fn write_or_print(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{contents}"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Generate {
            out,
            students,
            tests,
            questions_per_subject,
            seed,
        } => {
            let attempts = synth::generate(&synth::SynthConfig {
                students,
                tests,
                questions_per_subject,
                seed,
            });
            data::write_attempts(&out, &attempts)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Dataset created with {} rows.", attempts.len());
        }
        Commands::Train { training, json } => {
            let pipeline = run_pipeline(&training)?;
            if json {
                let summary = pipeline.run.summary();
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", pipeline.run.evaluation);
                println!();
                println!("Feature importances:");
                for (name, importance) in pipeline.run.model.feature_importances() {
                    println!("- {name}: {importance:.3}");
                }
            }
        }
        Commands::Predict {
            values,
            training,
            json,
        } => {
            let pipeline = run_pipeline(&training)?;
            let prediction = pipeline
                .run
                .model
                .predict_values(&values)
                .context("cannot diagnose this profile")?;
            if json {
                let output = serde_json::json!({
                    "evaluation": pipeline.run.evaluation,
                    "prediction": prediction,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print!("{}", pipeline.run.evaluation);
                println!();
                print_prediction(&prediction);
            }
        }
        Commands::Diagnose {
            student,
            cohort,
            report_window,
            training,
            out,
        } => {
            if student.is_none() && !cohort {
                anyhow::bail!("pass --student <ID>, --cohort, or both");
            }

            let report_window = WindowConfig::edges(training.tests, report_window);
            report_window
                .validate()
                .context("invalid report window")?;

            let (attempts, overview) = if cohort {
                let pipeline = run_pipeline(&training)?;
                let overview = report::build_cohort(&pipeline.table, &pipeline.run.model)?;
                (pipeline.attempts, Some(overview))
            } else {
                (load(training.csv.clone())?, None)
            };

            let diagnosis = student
                .as_deref()
                .map(|id| report::diagnose_student(&attempts, id, &report_window))
                .transpose()?;

            let today = chrono::Utc::now().date_naive();
            let contents = report::build_report(today, diagnosis.as_ref(), overview.as_ref());
            write_or_print(out.as_deref(), &contents)?;
        }
        Commands::Cohort {
            training,
            json,
            out,
        } => {
            let pipeline = run_pipeline(&training)?;
            let overview = report::build_cohort(&pipeline.table, &pipeline.run.model)?;
            let contents = if json {
                let mut rendered = serde_json::to_string_pretty(&overview)?;
                rendered.push('\n');
                rendered
            } else {
                let today = chrono::Utc::now().date_naive();
                report::build_report(today, None, Some(&overview))
            };
            write_or_print(out.as_deref(), &contents)?;
        }
    }

    Ok(())
}

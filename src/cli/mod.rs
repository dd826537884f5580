//! boostflow CLI Module
//!
//! Command-line interface for running the workflow and its stages one by one.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::artifact::{ArtifactRef, ArtifactStore};
use crate::config::EngineConfig;
use crate::data::{DatasetSchemas, TableLoader, TableWriter};
use crate::stages::{classification_report, fit_model, predict_labels, split_dataset, SplitConfig};
use crate::stages::evaluator::format_percentage;
use crate::training::{BoosterConfig, ModelArtifact};
use crate::workflow::{
    diabetes_xgboost_workflow, Binding, Executor, StageStatus, TaskCache, Value, WorkflowParams,
    DEFAULT_DATASET_URL,
};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn status_label(status: StageStatus) -> ColoredString {
    match status {
        StageStatus::Succeeded => ok("ran"),
        StageStatus::Cached => accent("cached"),
        StageStatus::Failed => "failed".red(),
        StageStatus::Pending | StageStatus::Running => muted(&status.to_string()),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "boostflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cached split/train/predict/evaluate workflow for gradient-boosted trees")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole workflow
    Run {
        /// Dataset URL or local path (headerless CSV, 9 columns)
        #[arg(short, long, default_value = DEFAULT_DATASET_URL)]
        dataset: String,

        /// Seed of the train/test permutation
        #[arg(short, long, default_value = "7")]
        seed: u64,

        /// Fraction of rows held out for testing
        #[arg(short, long, default_value = "0.33")]
        test_split_ratio: f64,

        /// Artifact store directory
        #[arg(long, env = "BOOSTFLOW_STORE_DIR")]
        store: Option<PathBuf>,

        /// Execute every stage even when a cached result exists
        #[arg(long)]
        no_cache: bool,

        /// Also write the model artifact to this file
        #[arg(long)]
        model_out: Option<PathBuf>,

        /// Print a JSON summary instead of the styled report
        #[arg(long)]
        json: bool,
    },

    /// Split a dataset and write the four partitions as headered CSV
    Split {
        /// Dataset URL or local path
        #[arg(short, long, default_value = DEFAULT_DATASET_URL)]
        dataset: String,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, default_value = "7")]
        seed: u64,

        #[arg(short, long, default_value = "0.33")]
        test_split_ratio: f64,
    },

    /// Fit a model from feature and label CSVs
    Train {
        /// Feature table (headered CSV)
        #[arg(short, long)]
        x: PathBuf,

        /// Label table (headered CSV)
        #[arg(short, long)]
        y: PathBuf,

        /// Output model file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "100")]
        n_estimators: usize,

        #[arg(long, default_value = "6")]
        max_depth: usize,

        #[arg(long, default_value = "0.3")]
        learning_rate: f64,
    },

    /// Predict labels for a feature CSV
    Predict {
        /// Trained model file
        #[arg(short, long)]
        model: PathBuf,

        /// Feature table (headered CSV)
        #[arg(short, long)]
        x: PathBuf,

        /// Output predictions file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Score predictions against ground truth
    Evaluate {
        /// Predicted labels (headered CSV)
        #[arg(short, long)]
        predictions: PathBuf,

        /// Actual labels (headered CSV)
        #[arg(short, long)]
        actual: PathBuf,
    },

    /// Show the workflow graph
    Graph {
        /// Emit Graphviz DOT
        #[arg(long)]
        dot: bool,
    },

    /// Inspect or clear the task cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Artifact store directory
        #[arg(long, env = "BOOSTFLOW_STORE_DIR")]
        store: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached stage executions
    List,
    /// Remove every cache entry
    Clear,
}

fn engine_config(store: Option<PathBuf>) -> EngineConfig {
    let config = EngineConfig::default();
    match store {
        Some(dir) => config.with_store_dir(dir),
        None => config,
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub async fn cmd_run(
    dataset: String,
    seed: u64,
    test_split_ratio: f64,
    store: Option<PathBuf>,
    no_cache: bool,
    model_out: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = engine_config(store);
    if no_cache {
        config = config.with_cache(false);
    }

    let params = WorkflowParams::default()
        .with_dataset(dataset)
        .with_seed(seed)
        .with_test_split_ratio(test_split_ratio);
    let inputs = params.clone().into_inputs()?;

    let graph = diabetes_xgboost_workflow(&DatasetSchemas::pima(), BoosterConfig::default())?;
    let executor = Executor::new(&config)?;
    let report = executor.run(&graph, inputs).await?;

    let model = match report.output("model")? {
        Value::Blob(a) => a.clone(),
        other => anyhow::bail!("model output has unexpected type {}", other.type_name()),
    };
    let accuracy = report.outputs.float("accuracy")?;

    if let Some(path) = &model_out {
        let bytes = executor.store().read(&model)?;
        std::fs::write(path, bytes)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        return Ok(());
    }

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", graph.name().white().bold()));
    line_box_center(&format!("{}", dim(&format!("run {}", report.run_id))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Dataset ", &truncate(&params.dataset, 46)));
    line_box(&kv("Seed    ", &params.seed.to_string()));
    line_box(&kv("Ratio   ", &params.test_split_ratio.to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    for record in &report.stages {
        line_box(&format!(
            "{:<10} {:<8} {}",
            record.node,
            status_label(record.status),
            dim(&format!("{} ms", record.duration_ms))
        ));
    }
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Accuracy", &format_percentage(accuracy)));
    line_box(&kv("Model   ", &truncate(&model.uri, 46)));
    if let Some(path) = &model_out {
        line_box(&kv("Saved   ", &truncate(&path.display().to_string(), 46)));
    }
    line_box_empty();
    line_box_bottom();
    println!();

    Ok(())
}

pub async fn cmd_split(
    dataset: String,
    output: PathBuf,
    seed: u64,
    test_split_ratio: f64,
) -> anyhow::Result<()> {
    section("Split");

    let config = SplitConfig::new(seed, test_split_ratio)?;
    let engine = EngineConfig::default();

    step_run("Splitting");
    let start = Instant::now();
    // Downloads use a blocking client, so stay off the async workers.
    let split = tokio::task::spawn_blocking(move || {
        let store = ArtifactStore::open(&engine.store_dir, engine.download_timeout_secs)?;
        let path = store.resolve(&ArtifactRef::dataset(dataset))?;
        split_dataset(&path, &DatasetSchemas::pima(), &config)
    })
    .await??;
    step_done(&format!(
        "{} train / {} test rows in {:?}",
        split.x_train.height(),
        split.x_test.height(),
        start.elapsed()
    ));

    std::fs::create_dir_all(&output)?;
    for (name, table) in [
        ("x_train", &split.x_train),
        ("x_test", &split.x_test),
        ("y_train", &split.y_train),
        ("y_test", &split.y_test),
    ] {
        let path = output.join(format!("{}.csv", name));
        TableWriter::save_csv(table, &path)?;
        println!("  {:<10} {}", muted(name), path.display());
    }
    println!();
    Ok(())
}

pub fn cmd_train(
    x: &Path,
    y: &Path,
    output: &Path,
    n_estimators: usize,
    max_depth: usize,
    learning_rate: f64,
) -> anyhow::Result<()> {
    section("Train");
    let schemas = DatasetSchemas::pima();

    step_run("Loading data");
    let loader = TableLoader::headered();
    let x = loader.load_csv(x, &schemas.features)?;
    let y = loader.load_csv(y, &schemas.labels)?;
    step_done(&format!("{} rows × {} features", x.height(), x.width()));

    let config = BoosterConfig::default()
        .with_n_estimators(n_estimators)
        .with_max_depth(max_depth)
        .with_learning_rate(learning_rate);

    step_run(&format!("Training {} trees", n_estimators.to_string().cyan()));
    let start = Instant::now();
    let model = fit_model(&x, &y, &config)?;
    step_done(&format!("{:?}", start.elapsed()));

    std::fs::write(output, model.to_bytes()?)?;
    println!();
    println!("  {:<16} {}", muted("Model"), output.display().to_string().white());
    println!();
    Ok(())
}

pub fn cmd_predict(model: &Path, x: &Path, output: &Path) -> anyhow::Result<()> {
    section("Predict");
    let schemas = DatasetSchemas::pima();

    step_run("Loading model");
    let artifact = ModelArtifact::from_bytes(&std::fs::read(model)?)?;
    step_done(&format!("{} trees", artifact.booster.n_trees()));

    let x = TableLoader::headered().load_csv(x, &schemas.features)?;
    step_run("Predicting");
    let predictions = predict_labels(&artifact, &x, &schemas.labels)?;
    TableWriter::save_csv(&predictions, output)?;
    step_done(&format!("{} rows → {}", predictions.height(), output.display()));
    println!();
    Ok(())
}

pub fn cmd_evaluate(predictions: &Path, actual: &Path) -> anyhow::Result<()> {
    section("Evaluate");
    let schemas = DatasetSchemas::pima();
    let loader = TableLoader::headered();
    let predictions = loader.load_csv(predictions, &schemas.labels)?;
    let actual = loader.load_csv(actual, &schemas.labels)?;

    let report = classification_report(&predictions, &actual)?;
    println!("  {:<16} {}", muted("Accuracy"), format_percentage(report.accuracy).white().bold());
    println!("  {:<16} {:.4}", muted("Precision"), report.precision);
    println!("  {:<16} {:.4}", muted("Recall"), report.recall);
    println!("  {:<16} {:.4}", muted("F1"), report.f1_score);
    println!(
        "  {:<16} tp {}  fp {}  tn {}  fn {}",
        muted("Confusion"),
        report.true_positives,
        report.false_positives,
        report.true_negatives,
        report.false_negatives
    );
    println!();
    Ok(())
}

pub fn cmd_graph(dot: bool) -> anyhow::Result<()> {
    let graph = diabetes_xgboost_workflow(&DatasetSchemas::pima(), BoosterConfig::default())?;
    if dot {
        print!("{}", graph.to_dot());
        return Ok(());
    }

    section(&format!("Workflow {}", graph.name()));
    for input in graph.inputs() {
        let default = input
            .default
            .as_ref()
            .map(|v| truncate(&v.summary(), 40))
            .unwrap_or_else(|| "required".to_string());
        println!("  {} {:<18} {:<10} {}", accent("in"), input.name, muted(&input.ty.to_string()), dim(&default));
        if !input.help.is_empty() {
            println!("     {}", dim(&input.help));
        }
    }
    println!();
    for (i, node) in graph.topological_order().enumerate() {
        println!("  {} {} {}", muted(&format!("{}.", i + 1)), node.id.white().bold(), dim(&format!("({})", node.stage.name())));
        for (port, binding) in &node.bindings {
            let source = match binding {
                Binding::Input(name) => format!("input {}", name),
                Binding::Output { node, port } => format!("{}.{}", node, port),
            };
            println!("     {:<18} ← {}", port, muted(&source));
        }
    }
    println!();
    for output in graph.outputs() {
        println!("  {} {:<18} {}", ok("out"), output.name, muted(&format!("{}.{}", output.node, output.port)));
    }
    println!();
    Ok(())
}

pub fn cmd_cache(action: CacheAction, store: Option<PathBuf>) -> anyhow::Result<()> {
    let config = engine_config(store);
    let store = Arc::new(ArtifactStore::open(&config.store_dir, config.download_timeout_secs)?);
    let cache = TaskCache::new(store);

    match action {
        CacheAction::List => {
            section("Cache");
            let entries = cache.entries()?;
            if entries.is_empty() {
                println!("  {}", dim("no entries"));
            }
            for entry in entries {
                println!(
                    "  {}  {:<10} {:<8} {}",
                    accent(entry.fingerprint.short()),
                    entry.node,
                    muted(&format!("v{}", entry.cache_version)),
                    dim(&entry.created_at.to_rfc3339())
                );
            }
        }
        CacheAction::Clear => {
            let removed = cache.clear()?;
            println!("  {} removed {} cache entries", ok("✓"), removed);
        }
    }
    println!();
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let tail: String = s.chars().rev().take(max - 1).collect::<Vec<_>>().into_iter().rev().collect();
        format!("…{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "hi".red());
        assert_eq!(strip_ansi(&colored), "hi");
    }

    #[test]
    fn test_truncate_keeps_tail() {
        assert_eq!(truncate("short", 10), "short");
        let t = truncate("https://example.com/very/long/path/data.csv", 12);
        assert_eq!(t.chars().count(), 12);
        assert!(t.ends_with("data.csv"));
    }

    #[test]
    fn test_cli_parses_run_defaults() {
        let cli = Cli::try_parse_from(["boostflow", "run"]).unwrap();
        match cli.command {
            Commands::Run { seed, test_split_ratio, no_cache, dataset, .. } => {
                assert_eq!(seed, 7);
                assert_eq!(test_split_ratio, 0.33);
                assert!(!no_cache);
                assert_eq!(dataset, DEFAULT_DATASET_URL);
            }
            _ => panic!("expected run"),
        }
    }
}

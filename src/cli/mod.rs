//! Habitus CLI Module
//!
//! Command-line interface for training, prediction, and artifact inspection.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::artifacts::ArtifactBundle;
use crate::inference::Predictor;
use crate::schema::{ObesityClass, SurveyRecord, TARGET_COLUMN};
use crate::training::{compare_models, ModelType, TrainEngine, TrainingConfig};

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
    let visible_len = strip_ansi(content).len();
    let pad = if visible_len < W { W - visible_len } else { 0 };
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).len();
    let total_pad = if visible_len < W { W - visible_len } else { 0 };
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

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
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

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "habitus")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Obesity-category classification from lifestyle survey data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a classifier and save the artifact bundle
    Train {
        /// Training data file (CSV with survey columns and target)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = TARGET_COLUMN)]
        target: String,

        /// Model type (decision_tree, random_forest)
        #[arg(short, long, default_value = "random_forest")]
        model: String,

        /// Number of trees for random forest
        #[arg(long, default_value = "100")]
        trees: usize,

        /// Maximum tree depth (unbounded when omitted)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of cross-validation folds (0 disables CV)
        #[arg(long, default_value = "0")]
        cv_folds: usize,

        /// Train every model type and keep the most accurate one
        #[arg(long)]
        compare: bool,

        /// Output bundle file
        #[arg(short, long, default_value = "models/bundle.json")]
        output: PathBuf,
    },

    /// Classify a survey record with a trained bundle
    Predict {
        /// Artifact bundle file
        #[arg(short, long, default_value = "models/bundle.json")]
        artifacts: PathBuf,

        /// Input file: one survey record as JSON
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Verify that an artifact bundle is a usable matched set
    Check {
        /// Artifact bundle file
        #[arg(short, long, default_value = "models/bundle.json")]
        artifacts: PathBuf,

        /// Optional data file to score through the full inference path
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Show dataset and/or bundle information
    Info {
        /// Artifact bundle file
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// Data file
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &PathBuf) -> anyhow::Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.clone()))?
            .finish()?,
        _ => anyhow::bail!("Unsupported file format: {} (expected .csv)", ext),
    };

    Ok(df)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    data_path: &PathBuf,
    target: &str,
    model: &str,
    trees: usize,
    max_depth: Option<usize>,
    seed: u64,
    cv_folds: usize,
    compare: bool,
    output: &PathBuf,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let model_type = match ModelType::from_token(model) {
        Some(m) => m,
        None => anyhow::bail!("Invalid model type: {} (expected decision_tree or random_forest)", model),
    };

    let mut config = TrainingConfig::new(target)
        .with_model(model_type)
        .with_n_estimators(trees)
        .with_random_state(seed)
        .with_cv(cv_folds);
    if let Some(depth) = max_depth {
        config = config.with_max_depth(depth);
    }

    if compare {
        section("Compare");
        println!("  {:<18} {:>10} {:>10} {:>10}", muted("Model"), muted("Accuracy"), muted("F1"), muted("Time"));
        println!("  {}", dim(&"─".repeat(50)));

        let rows = compare_models(&df, &config)?;
        for row in &rows {
            println!(
                "  {:<18} {:>10.4} {:>10.4} {:>9.2}s",
                row.model_type.name(), row.accuracy, row.f1_weighted, row.training_time_secs
            );
        }
        println!("  {}", dim(&"─".repeat(50)));

        if let Some(best) = rows.first() {
            println!();
            println!("  {} {}", ok("best"), best.model_type.name().white().bold());
            config = config.with_model(best.model_type);
        }
        println!();
    }

    step_run(&format!("Training {}", config.model_type.name().cyan()));
    let start = Instant::now();
    let mut engine = TrainEngine::new(config);
    engine.fit(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    let metrics = engine.metrics().cloned().unwrap_or_default();
    println!();
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", metrics.accuracy).white().bold());
    println!("  {:<16} {}", muted("F1 (weighted)"), format!("{:.4}", metrics.f1_weighted).white());
    if let Some(cv) = engine.cv() {
        println!("  {:<16} {}", muted("CV accuracy"), format!("{:.4} ± {:.4} ({} folds)", cv.mean, cv.std, cv.n_folds).white());
    }
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", metrics.training_time_secs).white());

    if !metrics.per_class.is_empty() {
        // Shown least to most severe, not in encoded-code order
        let mut per_class = metrics.per_class.clone();
        per_class.sort_by_key(|c| {
            ObesityClass::from_label(&c.label)
                .map(|class| class.severity_rank())
                .unwrap_or(usize::MAX)
        });

        println!();
        println!("  {:<22} {:>10} {:>10} {:>8}", muted("Class"), muted("F1"), muted("Recall"), muted("Support"));
        println!("  {}", dim(&"─".repeat(54)));
        for c in &per_class {
            println!("  {:<22} {:>10.4} {:>10.4} {:>8}", c.label, c.f1, c.recall, c.support);
        }
    }
    println!();

    step_run(&format!("Saving → {}", output.display()));
    let bundle = engine.into_bundle()?;
    bundle.save(output)?;
    step_done(&format!("{} classes, {} features", bundle.model.n_classes(), bundle.feature_order.len()));

    println!();
    Ok(())
}

pub fn cmd_predict(artifacts_path: &PathBuf, input_path: &PathBuf) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading bundle");
    let predictor = Predictor::load(artifacts_path)?;
    step_done(&format!(
        "{} classes, {} features",
        predictor.bundle().model.n_classes(),
        predictor.bundle().feature_order.len()
    ));

    let raw = std::fs::read_to_string(input_path)?;
    let record: SurveyRecord = serde_json::from_str(&raw)?;

    let prediction = predictor.predict(&record)?;

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", prediction.class.to_string().white().bold()));
    line_box_center(&format!("{}", dim(&format!("confidence {:.1}%", prediction.confidence * 100.0))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("BMI      ", &format!("{:.1}", prediction.bmi)));
    line_box(&kv("Category ", &prediction.bmi_category));
    line_box_empty();
    line_box_bottom();

    section("Probabilities");
    for (class, p) in &prediction.probabilities {
        let row = format!("{:<22} {:>8.4}", class.to_string(), p);
        if *class == prediction.class {
            println!("  {}", row.white().bold());
        } else {
            println!("  {}", muted(&row));
        }
    }

    let advice = predictor.explain(&record, &prediction);
    if !advice.is_empty() {
        section("Recommendations");
        for item in &advice {
            println!("  {} {}", accent("›"), item);
        }
    }

    println!();
    Ok(())
}

pub fn cmd_check(artifacts_path: &PathBuf, data_path: Option<&PathBuf>) -> anyhow::Result<()> {
    section("Check");

    step_run("Loading bundle");
    let bundle = ArtifactBundle::load(artifacts_path)?;
    step_done(&format!("{}", artifacts_path.display()));
    step_ok("Bundle is a matched encoder/scaler/model set");

    println!();
    println!("  {:<12} {}", muted("Model"), bundle.model.model_type().name());
    println!("  {:<12} {}", muted("Created"), bundle.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  {:<12} {}", muted("Schema"), bundle.schema_version);
    println!("  {:<12} {}", muted("Classes"), bundle.model.n_classes());
    println!("  {:<12} {}", muted("Features"), bundle.feature_order.len());
    if let Some(metrics) = &bundle.metrics {
        println!("  {:<12} {:.4}", muted("Accuracy"), metrics.accuracy);
    }

    if let Some(data_path) = data_path {
        step_run("Loading data");
        let df = load_data(data_path)?;
        step_done(&format!("{} rows", df.height()));

        // Score the rows the way a serving process would; the target column
        // is not part of the inference schema
        let df = if df.get_column_names().iter().any(|c| c.as_str() == TARGET_COLUMN) {
            df.drop(TARGET_COLUMN)?
        } else {
            df
        };

        step_run("Scoring through the inference path");
        let start = Instant::now();
        let x = bundle.preparer().prepare(&df)?;
        let y = bundle.model.predict(&x)?;
        step_done(&format!("{} rows in {:?}", y.len(), start.elapsed()));

        let mut counts = [0usize; 7];
        for &code in y.iter() {
            let label = bundle.target_encoder.decode(code.round() as u32)?;
            if let Some(class) = ObesityClass::from_label(label) {
                counts[class.severity_rank()] += 1;
            }
        }

        println!();
        println!("  {:<22} {:>8}", muted("Predicted class"), muted("Rows"));
        println!("  {}", dim(&"─".repeat(32)));
        for (class, count) in ObesityClass::CANONICAL_ORDER.iter().zip(counts) {
            println!("  {:<22} {:>8}", class.to_string(), count);
        }
    }

    println!();
    Ok(())
}

pub fn cmd_info(artifacts_path: Option<&PathBuf>, data_path: Option<&PathBuf>) -> anyhow::Result<()> {
    if artifacts_path.is_none() && data_path.is_none() {
        anyhow::bail!("Provide --artifacts and/or --data");
    }

    if let Some(data_path) = data_path {
        section("Data Info");

        let df = load_data(data_path)?;

        println!("  {:<12} {}", muted("File"), data_path.display());
        println!("  {:<12} {}", muted("Rows"), df.height());
        println!("  {:<12} {}", muted("Columns"), df.width());
        println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
        println!();

        println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
        println!("  {}", dim(&"─".repeat(50)));

        for col in df.get_columns() {
            println!(
                "  {:<20} {:<12} {:>6} {:>8}",
                col.name(),
                format!("{:?}", col.dtype()).truecolor(140, 140, 140),
                col.null_count(),
                col.n_unique().unwrap_or(0)
            );
        }
    }

    if let Some(artifacts_path) = artifacts_path {
        section("Bundle Info");

        let bundle = ArtifactBundle::load(artifacts_path)?;

        println!("  {:<12} {}", muted("File"), artifacts_path.display());
        println!("  {:<12} {}", muted("Model"), bundle.model.model_type().name());
        println!("  {:<12} {}", muted("Created"), bundle.created_at.format("%Y-%m-%d %H:%M UTC"));
        println!("  {:<12} {}", muted("Schema"), bundle.schema_version);
        println!("  {:<12} {}", muted("Features"), bundle.feature_order.join(", "));
        if let Some(metrics) = &bundle.metrics {
            println!("  {:<12} {:.4}", muted("Accuracy"), metrics.accuracy);
            println!("  {:<12} {:.4}", muted("F1"), metrics.f1_weighted);
        }

        println!();
        println!("  {:<22} {:>6} {:>12}", muted("Class"), muted("Code"), muted("Severity"));
        println!("  {}", dim(&"─".repeat(44)));
        let interpretation = crate::interpret::Interpretation::default();
        for class in ObesityClass::CANONICAL_ORDER {
            let code = bundle
                .target_encoder
                .classes()
                .iter()
                .position(|label| label == class.as_label());
            let code = match code {
                Some(c) => c.to_string(),
                None => "-".to_string(),
            };
            println!(
                "  {:<22} {:>6} {:>12}",
                class.to_string(),
                code,
                interpretation.severity(class).as_str()
            );
        }
    }

    println!();
    Ok(())
}

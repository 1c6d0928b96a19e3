//! Sylva command line interface
//!
//! Loads an exported decision tree and evaluates it offline: predictions,
//! decision rules and a structural summary.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use sylva_local_model::{
    list_rules, list_rules_for, AuditLog, InputRow, LocalModel, LocalModelConfig, LogFormat,
    Output, Prediction, PredictionPolicy,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "sylva")]
#[command(about = "Evaluate exported decision trees offline", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict one row or an array of rows
    Predict(PredictCommand),
    /// Print the decision rule of every leaf
    Rules(RulesCommand),
    /// Print a structural summary of the tree
    Inspect {
        /// Model JSON file
        #[arg(long)]
        model: PathBuf,
    },
}

#[derive(Args)]
struct PredictCommand {
    /// Model JSON file
    #[arg(long)]
    model: PathBuf,
    /// Input JSON file holding an object or an array of objects; `-` reads stdin
    #[arg(long)]
    input: PathBuf,
    /// Input rows are keyed by field name
    #[arg(long)]
    by_name: bool,
    #[arg(long)]
    max_depth: Option<usize>,
    #[arg(long)]
    min_instances: Option<u64>,
    /// Append one audit record per prediction to this file as JSON lines
    #[arg(long, value_name = "FILE")]
    audit: Option<PathBuf>,
}

#[derive(Args)]
struct RulesCommand {
    /// Model JSON file
    #[arg(long)]
    model: PathBuf,
    /// Only rules whose leaf predicts this output
    #[arg(long)]
    output: Option<String>,
    /// Emit rules as JSON
    #[arg(long)]
    json: bool,
}

impl PredictCommand {
    /// Command-line flags take precedence over configuration.
    fn policy(&self, base: &PredictionPolicy) -> PredictionPolicy {
        PredictionPolicy {
            max_depth: self.max_depth.or(base.max_depth),
            min_instances: self.min_instances.or(base.min_instances),
            by_name: self.by_name || base.by_name,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    config.apply_env_overrides();
    init_logging(&config)?;
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "configuration loaded");
    }
    for warning in config.validate() {
        warn!("{}", warning);
    }

    match cli.command {
        Commands::Predict(cmd) => handle_predict_command(cmd, &config),
        Commands::Rules(cmd) => handle_rules_command(cmd),
        Commands::Inspect { model } => {
            let model = load_model(&model)?;
            println!("{}", serde_json::to_string_pretty(&model.summary())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<LocalModelConfig> {
    match path {
        Some(path) => LocalModelConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(LocalModelConfig::default()),
    }
}

fn init_logging(config: &LocalModelConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // stdout carries results, so logs go to stderr
    match config.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}

fn load_model(path: &Path) -> Result<LocalModel> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read model {}", path.display()))?;
    LocalModel::from_json_str(&json)
        .with_context(|| format!("failed to load model {}", path.display()))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    fs::read_to_string(path).with_context(|| format!("failed to read input {}", path.display()))
}

/// Returns the rows and whether the document was a single object.
fn parse_inputs(json: &str) -> Result<(Vec<InputRow>, bool)> {
    let value: Value = serde_json::from_str(json).context("input is not valid JSON")?;
    match value {
        Value::Object(map) => Ok((vec![map.into_iter().collect()], true)),
        Value::Array(items) => {
            let rows = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(map) => Ok(map.into_iter().collect()),
                    other => bail!("input row {index} is not an object: {other}"),
                })
                .collect::<Result<Vec<InputRow>>>()?;
            Ok((rows, false))
        }
        other => bail!("input must be an object or an array of objects, found {other}"),
    }
}

fn prediction_json(model: &LocalModel, prediction: &Prediction) -> Value {
    json!({
        "output": prediction.output,
        "confidence": prediction.confidence,
        "count": prediction.count,
        "distribution": prediction.distribution,
        "node_id": prediction.node_id,
        "depth": prediction.depth,
        "stop": prediction.stop,
        "rule": prediction.rule(model.fields()),
    })
}

struct PredictReport {
    rows: Vec<Value>,
    failed: usize,
}

fn predict_rows(
    model: &LocalModel,
    inputs: &[InputRow],
    policy: &PredictionPolicy,
    audit: Option<&mut AuditLog>,
) -> Result<PredictReport> {
    let mut audit = audit;
    let mut rows = Vec::with_capacity(inputs.len());
    let mut failed = 0;

    for (input, result) in inputs.iter().zip(model.predict_batch(inputs, policy)) {
        match result {
            Ok(prediction) => {
                rows.push(prediction_json(model, &prediction));
                if let Some(log) = audit.as_deref_mut() {
                    log.record(model, input, prediction)?;
                }
            }
            Err(err) => {
                failed += 1;
                rows.push(json!({ "error": err.to_string() }));
            }
        }
    }

    Ok(PredictReport { rows, failed })
}

fn handle_predict_command(cmd: PredictCommand, config: &LocalModelConfig) -> Result<()> {
    let model = load_model(&cmd.model)?;
    let policy = cmd.policy(&config.prediction);
    let (inputs, single) = parse_inputs(&read_input(&cmd.input)?)?;

    let mut audit_log = cmd.audit.as_ref().map(|_| AuditLog::new());
    let report = predict_rows(&model, &inputs, &policy, audit_log.as_mut())?;

    if let (Some(path), Some(log)) = (&cmd.audit, &audit_log) {
        append_audit(path, log)?;
        info!(records = log.len(), path = %path.display(), "audit records written");
    }

    let output = if single {
        report.rows.into_iter().next().unwrap_or(Value::Null)
    } else {
        Value::Array(report.rows)
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if report.failed > 0 {
        bail!("{} of {} input rows could not be evaluated", report.failed, inputs.len());
    }
    Ok(())
}

fn append_audit(path: &Path, log: &AuditLog) -> Result<()> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open audit file {}", path.display()))?;
    file.write_all(log.to_json_lines()?.as_bytes())?;
    Ok(())
}

/// Resolves a command-line label to one of the model's leaf outputs, so
/// numeric outputs match whatever spelling they print with.
fn output_for_label(model: &LocalModel, label: &str) -> Output {
    model
        .root()
        .descendants()
        .into_iter()
        .filter(|node| node.is_leaf())
        .map(|node| &node.stats().output)
        .find(|output| output.to_string() == label)
        .cloned()
        .unwrap_or_else(|| match label.parse::<f64>() {
            Ok(value) => Output::Number(value),
            Err(_) => Output::from(label),
        })
}

fn handle_rules_command(cmd: RulesCommand) -> Result<()> {
    let model = load_model(&cmd.model)?;
    let rules = match cmd.output.as_deref() {
        Some(label) => list_rules_for(&model, &output_for_label(&model, label)),
        None => list_rules(&model),
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    if rules.is_empty() {
        println!("No rules found.");
    }
    for rule in &rules {
        println!("{rule}\n");
    }
    Ok(())
}

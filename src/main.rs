//! AdPricing CLI
//!
//! Usage: adpricing <train|evaluate|predict|importance|serve> [--data PATH] [--model-dir DIR]

use adpricing::config::{AppConfig, ModelKind};
use adpricing::data::Table;
use adpricing::evaluation::evaluate_model;
use adpricing::model::persistence::{self, PIPELINE_FILE};
use adpricing::model::{AdPricingModel, LinearBaseline, LstmRegressor, SequenceModel};
use adpricing::preprocessing::{prepare, split, FittedPipeline};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "adpricing", version, about = "Ad spend analytics and bid forecasting")]
struct Cli {
    /// Extra config file layered over config/default and config/local
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Input CSV (overrides data.path)
    #[arg(long, global = true)]
    data: Option<String>,

    /// Model directory (overrides model.dir)
    #[arg(long, global = true)]
    model_dir: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the configured model and save it with its scalers and encoder
    Train {
        /// Overrides training.epochs
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Score a saved model on the test portion of the data
    Evaluate,
    /// Forecast the target for the step after the last row
    Predict,
    /// Permutation importance of every encoded feature
    Importance {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Only print the N most important features
        #[arg(long)]
        top: Option<usize>,
    },
    /// Serve the analytics dashboard API
    #[cfg(feature = "dashboard")]
    Serve {
        /// Overrides dashboard.bind
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    if let Some(path) = cli.data {
        config.data.path = path;
    }
    if let Some(dir) = cli.model_dir {
        config.model.dir = dir;
    }
    info!("⚙️ {}", config);

    match cli.command {
        #[cfg(feature = "dashboard")]
        Command::Serve { bind } => {
            use adpricing::dashboard::{start_server, DashboardContext};
            use std::sync::Arc;

            let bind = bind.unwrap_or_else(|| config.dashboard.bind.clone());
            let context = Arc::new(DashboardContext::open(&config.data.path));
            start_server(context, &bind).await
        }
        command => tokio::task::spawn_blocking(move || dispatch(&config, command))
            .await
            .context("pipeline task panicked")?,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn dispatch(config: &AppConfig, command: Command) -> Result<()> {
    match config.model.kind {
        ModelKind::Lstm => run::<LstmRegressor>(config, command, &config.lstm_config()),
        ModelKind::Linear => run::<LinearBaseline>(config, command, &config.linear_config()),
    }
}

fn run<M: SequenceModel>(config: &AppConfig, command: Command, model_config: &M::Config) -> Result<()> {
    let dir = Path::new(&config.model.dir);
    match command {
        Command::Train { epochs } => train::<M>(config, model_config, epochs, dir),
        Command::Evaluate => evaluate::<M>(config, dir),
        Command::Predict => predict::<M>(config, dir),
        Command::Importance { seed, top } => importance::<M>(config, dir, seed, top),
        #[cfg(feature = "dashboard")]
        Command::Serve { .. } => anyhow::bail!("serve runs on the async runtime"),
    }
}

/// The loader keeps file order; windows need time order.
fn load_table(config: &AppConfig) -> Result<Table> {
    let table = Table::load(&config.data.path)
        .with_context(|| format!("Failed to load {}", config.data.path))?;
    Ok(table.sorted_by_date())
}

fn load_saved<M: SequenceModel>(dir: &Path) -> Result<(AdPricingModel<M>, FittedPipeline)> {
    let model = AdPricingModel::<M>::load(dir)
        .with_context(|| format!("Failed to load model from {}", dir.display()))?;
    let pipeline: FittedPipeline = persistence::read_json(&dir.join(PIPELINE_FILE))
        .context("Failed to load the fitted encoder; retrain the model")?;
    Ok((model, pipeline))
}

fn train<M: SequenceModel>(
    config: &AppConfig,
    model_config: &M::Config,
    epochs: Option<usize>,
    dir: &Path,
) -> Result<()> {
    let table = load_table(config)?;
    let prepared = prepare(&table, &config.pipeline_params()).context("Preprocessing failed")?;

    let mut options = config.fit_options();
    if let Some(epochs) = epochs {
        options.epochs = epochs;
    }

    info!(
        "🧠 Training {} on {} windows (input {:?})",
        config.model.kind,
        prepared.split.train_len(),
        prepared.input_shape()
    );
    let mut model = AdPricingModel::<M>::with_config(prepared.input_shape(), 1, model_config)
        .with_feature_names(prepared.matrix.columns.clone());
    let history = model
        .train(&prepared.split.train_features, &prepared.split.train_labels, &options)
        .context("Training failed")?;

    let final_loss = history.loss.last().copied().unwrap_or(f64::NAN);
    info!(
        "✅ Trained {} epochs (final loss {:.6}, best epoch {:?})",
        history.epochs_run(),
        final_loss,
        history.best_epoch
    );
    if let Some(epoch) = history.stopped_epoch {
        info!("⏹️ Early stopping at epoch {}", epoch);
    }

    if prepared.split.test_len() > 0 {
        let split = &prepared.split;
        let scaled = model.evaluate(&split.test_features, &split.test_labels)?;
        info!("📉 Test loss {:.6}, MAE {:.6} (scaled)", scaled.loss, scaled.metric);

        let predictions = model.predict(&split.test_features)?;
        let y_pred = prepared.target_inverse(&predictions.column(0).to_vec())?;
        let y_true = prepared.target_inverse(&split.test_labels.column(0).to_vec())?;
        let metrics = evaluate_model(&y_true, &y_pred)?;
        info!("📊 Test metrics: {}", metrics);
    } else {
        warn!("⚠️ No test windows; skipping evaluation");
    }

    model.save(dir).context("Failed to save model")?;
    persistence::write_json(&dir.join(PIPELINE_FILE), &prepared.pipeline)?;
    Ok(())
}

fn evaluate<M: SequenceModel>(config: &AppConfig, dir: &Path) -> Result<()> {
    let (model, pipeline) = load_saved::<M>(dir)?;
    let table = load_table(config)?;
    let (windows, labels) = pipeline.windows(&table)?;
    let split = split(&windows, &labels, pipeline.params.train_ratio)?;
    if split.test_len() == 0 {
        anyhow::bail!("no test windows at train_ratio {}", pipeline.params.train_ratio);
    }

    let scaled = model.evaluate(&split.test_features, &split.test_labels)?;
    let predictions = model.predict(&split.test_features)?;
    let y_pred = pipeline.target_inverse(&predictions.column(0).to_vec())?;
    let y_true = pipeline.target_inverse(&split.test_labels.column(0).to_vec())?;
    let metrics = evaluate_model(&y_true, &y_pred)?;

    info!(
        "📉 {} test windows: loss {:.6}, MAE {:.6} (scaled)",
        split.test_len(),
        scaled.loss,
        scaled.metric
    );
    info!("📊 {}", metrics);
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

fn predict<M: SequenceModel>(config: &AppConfig, dir: &Path) -> Result<()> {
    let (model, pipeline) = load_saved::<M>(dir)?;
    let table = load_table(config)?;
    let window = pipeline.latest_window(&table)?;
    let encoded = model.predict(&window)?;
    let forecast = pipeline.target_inverse(&encoded.column(0).to_vec())?;

    let target = &pipeline.params.target_column;
    for value in forecast {
        info!("🔮 Next {}: {:.4}", target, value);
        println!("{}", value);
    }
    Ok(())
}

fn importance<M: SequenceModel>(
    config: &AppConfig,
    dir: &Path,
    seed: u64,
    top: Option<usize>,
) -> Result<()> {
    let (model, pipeline) = load_saved::<M>(dir)?;
    let table = load_table(config)?;
    let (windows, _) = pipeline.windows(&table)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let scores = model.feature_importance(&windows, &mut rng)?;
    let names = if model.feature_names().len() == scores.len() {
        model.feature_names().to_vec()
    } else {
        (0..scores.len()).map(|i| format!("feature_{}", i)).collect()
    };

    let mut ranked: Vec<(String, f64)> = names.into_iter().zip(scores).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (name, score) in ranked.iter().take(top.unwrap_or(ranked.len())) {
        println!("{:<32} {:.6}", name, score);
    }
    Ok(())
}

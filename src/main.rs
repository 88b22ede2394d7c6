//! traffic-gnn - congestion prediction on road networks
//!
//! Usage:
//!   traffic-gnn train --traffic data/traffic_data.csv --roads data/road_network.csv
//!   traffic-gnn predict --traffic data/traffic_data.csv --roads data/road_network.csv
//!   traffic-gnn demo --nodes 100 --seed 42
//!   traffic-gnn info --model traffic_gnn_model.safetensors

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use traffic_gnn::config::TrainConfig;
use traffic_gnn::data::TrafficDataLoader;
use traffic_gnn::evaluate::{accuracy, evaluate_model, predict, PredictionStats};
use traffic_gnn::model::{TrafficGNN, DEFAULT_CHECKPOINT};
use traffic_gnn::serialization::load_safetensors;
use traffic_gnn::synthetic::{generate_sample_data, SampleSpec};
use traffic_gnn::train::train_model;
use traffic_gnn::viz::{plot_predictions, plot_training_progress, PREDICTION_PLOT, TRAINING_PLOT};
use traffic_gnn::{Result, TrafficError};

/// Train and run a graph neural network that predicts congestion levels
/// for every intersection of a road network.
#[derive(Parser)]
#[command(name = "traffic-gnn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on traffic measurements and a road network
    Train {
        /// Traffic measurements CSV
        #[arg(long, value_name = "CSV")]
        traffic: PathBuf,

        /// Road network CSV
        #[arg(long, value_name = "CSV")]
        roads: PathBuf,

        /// JSON training configuration
        #[arg(long, value_name = "JSON")]
        config: Option<PathBuf>,

        #[arg(long)]
        epochs: Option<usize>,

        /// Learning rate
        #[arg(long)]
        lr: Option<f32>,

        /// Hidden layer width
        #[arg(long)]
        hidden: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Checkpoint to write
        #[arg(short, long, default_value = DEFAULT_CHECKPOINT)]
        output: PathBuf,

        /// Training curve image (.png or .svg)
        #[arg(long, default_value = TRAINING_PLOT)]
        plot: PathBuf,
    },

    /// Predict congestion levels with a trained model
    Predict {
        /// Traffic measurements CSV
        #[arg(long, value_name = "CSV")]
        traffic: PathBuf,

        /// Road network CSV
        #[arg(long, value_name = "CSV")]
        roads: PathBuf,

        /// Trained checkpoint
        #[arg(long, default_value = DEFAULT_CHECKPOINT)]
        model: PathBuf,

        /// Prediction map image (.png or .svg)
        #[arg(long, default_value = PREDICTION_PLOT)]
        plot: PathBuf,
    },

    /// Train and evaluate on a random graph
    Demo {
        #[arg(long, default_value = "100")]
        nodes: usize,

        #[arg(long, default_value = "10")]
        features: usize,

        #[arg(long, default_value = "3")]
        classes: usize,

        #[arg(long, default_value = "200")]
        epochs: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show the configuration and tensors stored in a checkpoint
    Info {
        #[arg(long, default_value = DEFAULT_CHECKPOINT)]
        model: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Train {
            traffic,
            roads,
            config,
            epochs,
            lr,
            hidden,
            seed,
            output,
            plot,
        } => {
            let overrides = Overrides {
                epochs,
                lr,
                hidden,
                seed,
            };
            cmd_train(&traffic, &roads, config.as_deref(), &overrides, &output, &plot)
        }

        Commands::Predict {
            traffic,
            roads,
            model,
            plot,
        } => cmd_predict(&traffic, &roads, &model, &plot),

        Commands::Demo {
            nodes,
            features,
            classes,
            epochs,
            seed,
        } => cmd_demo(
            SampleSpec {
                num_nodes: nodes,
                num_features: features,
                num_classes: classes,
            },
            epochs,
            seed,
        ),

        Commands::Info { model } => cmd_info(&model),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "traffic_gnn=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Command-line values that replace configuration-file values.
struct Overrides {
    epochs: Option<usize>,
    lr: Option<f32>,
    hidden: Option<usize>,
    seed: Option<u64>,
}

impl Overrides {
    fn apply(&self, config: &mut TrainConfig) {
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if let Some(hidden) = self.hidden {
            config.hidden_channels = hidden;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

fn cmd_train(
    traffic: &Path,
    roads: &Path,
    config_path: Option<&Path>,
    overrides: &Overrides,
    output: &Path,
    plot: &Path,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => TrainConfig::from_json_file(path)?,
        None => TrainConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;

    info!("Loading traffic data...");
    let mut loader = TrafficDataLoader::new().with_seed(config.seed);
    let loaded = loader.load_traffic_data(traffic, roads)?;
    let data = loader.create_graph_data(&loaded)?;
    let data = loader.create_train_test_split(data, config.train_ratio)?;

    let mut model = config.build_model(data.num_features(), data.num_classes())?;

    info!("Training model...");
    let history = train_model(&mut model, &data, &config)?;

    if let Err(e) = plot_training_progress(&history, plot) {
        warn!("skipping training plot: {e}");
    }

    let acc = evaluate_model(&mut model, &data)?;
    println!("\nTest Accuracy: {acc:.4}");

    model.save(output)?;
    println!("Model saved as '{}'", output.display());
    Ok(())
}

fn cmd_predict(traffic: &Path, roads: &Path, model_path: &Path, plot: &Path) -> Result<()> {
    info!("Loading traffic data...");
    let mut loader = TrafficDataLoader::new();
    let loaded = loader.load_traffic_data(traffic, roads)?;
    let data = loader.create_graph_data(&loaded)?;

    let mut model = TrafficGNN::load(model_path)?;

    info!("Making predictions...");
    let predictions = predict(&mut model, &data)?;

    if let Some(positions) = &data.positions {
        info!("Visualizing predictions...");
        if let Err(e) = plot_predictions(positions, &predictions, plot) {
            warn!("skipping prediction map: {e}");
        }
    }

    let stats = PredictionStats::from_predictions(&predictions, model.config().num_classes);
    println!("\nPrediction Statistics:");
    print!("{stats}");
    println!(
        "\nPrediction Accuracy: {:.4}",
        accuracy(&predictions, &data.y, None)
    );
    Ok(())
}

fn cmd_demo(spec: SampleSpec, epochs: usize, seed: u64) -> Result<()> {
    if spec.num_nodes == 0 || spec.num_classes == 0 {
        return Err(TrafficError::InvalidHyperparameter {
            param: "nodes/classes".to_string(),
            value: format!("{}/{}", spec.num_nodes, spec.num_classes),
            constraint: "must be positive".to_string(),
        });
    }

    let data = generate_sample_data(spec, Some(seed))?;
    let config = TrainConfig {
        epochs,
        seed: Some(seed),
        ..TrainConfig::default()
    };
    let mut model = config.build_model(spec.num_features, spec.num_classes)?;

    info!("Training model...");
    train_model(&mut model, &data, &config)?;

    let acc = evaluate_model(&mut model, &data)?;
    println!("\nTest Accuracy: {acc:.4}");
    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let config = TrafficGNN::read_config(path)?;
    let loaded = load_safetensors(path)?;

    println!("Checkpoint: {}", path.display());
    println!("  num_features:    {}", config.num_features);
    println!("  hidden_channels: {}", config.hidden_channels);
    println!("  num_classes:     {}", config.num_classes);
    println!("  dropout:         {}", config.dropout);
    println!("\nTensors:");

    let mut total = 0usize;
    for (name, meta) in &loaded.metadata {
        let numel: usize = meta.shape.iter().product();
        total += numel;
        println!("  {name:<20} {:?} ({numel})", meta.shape);
    }
    println!("\nTotal parameters: {total}");
    Ok(())
}

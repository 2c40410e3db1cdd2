//! Model Training
//!
//! Trains the forecast regressor on all stored history for the monitored
//! stations and replaces the model artifact. With too little history the
//! previous model is kept and the command exits with status 2.
//!
//! Usage:
//!   cargo run --bin train_model -- --database
//!   cargo run --bin train_model -- --readings export.json --model /tmp/model.json
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (with --database)

use chrono::Utc;
use clap::Parser;
use flomon_forecast::cli::CommonArgs;
use flomon_forecast::forecast::TrainOutcome;
use flomon_forecast::forecast::trainer::Trainer;

#[derive(Parser, Debug)]
#[command(name = "train_model")]
#[command(about = "Train the flood forecast model and replace the stored artifact")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
    let cli = Cli::parse();
    cli.common.init_logging();

    println!("🧠 Flood Forecast Model Training");
    println!("================================\n");

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("\n❌ Training failed: {}\n", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether a new model was saved.
fn run(cli: &Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = cli.common.load_config()?;
    let store = cli.common.artifact_store(&config);
    let mut opened = cli.common.open_source()?;

    println!(
        "   Target {} at +{} h, {} stations × {} lags",
        config.target_station,
        config.horizon_hours,
        config.stations.len(),
        config.lag_hours
    );

    let trainer = Trainer::new(&config, &store);
    match trainer.train_from_source(opened.source.as_mut(), Utc::now())? {
        TrainOutcome::Trained(report) => {
            println!("\n✓ Model v{} saved to {}", report.handle.version, report.handle.location);
            println!("   Samples: {}", report.samples);
            println!(
                "   In-sample fit: R² = {:.4} | MAE = {:.4} m | RMSE = {:.4} m",
                report.in_sample.r2, report.in_sample.mae, report.in_sample.rmse
            );
            Ok(true)
        }
        TrainOutcome::InsufficientData(reason) => {
            println!("\n⚠️  Not enough data to train: {}", reason);
            println!("   The existing model (if any) is still in use.");
            Ok(false)
        }
    }
}

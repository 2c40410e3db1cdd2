//! Flood Forecast - predict and notify
//!
//! Fetches the recent readings for the monitored stations, runs the hybrid
//! forecast against the current trained model, prints the decision and
//! hands any warning-or-worse decision to the alert dispatcher.
//!
//! Usage:
//!   cargo run --release -- --database
//!   cargo run --release -- --readings export.json --at 2025-09-28T06:00:00Z
//!
//! Environment:
//!   DATABASE_URL           - PostgreSQL connection string (with --database)
//!   FLOMON_FORECAST_CONFIG - path to forecast.toml
//!   FLOMON_MODEL_PATH      - trained model location

use chrono::{DateTime, Utc};
use clap::Parser;
use flomon_forecast::alert::notify::{LogDispatcher, notify};
use flomon_forecast::cli::CommonArgs;
use flomon_forecast::forecast::PredictionOutcome;
use flomon_forecast::forecast::predictor::Predictor;

#[derive(Parser, Debug)]
#[command(name = "flomon_forecast")]
#[command(about = "Forecast the Mun River level at Ubon Ratchathani and raise alerts")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Forecast as of this time (default: newest reading in --readings, else now)
    #[arg(long, value_name = "RFC3339")]
    at: Option<DateTime<Utc>>,

    /// Print the decision as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Do not dispatch alerts
    #[arg(long)]
    no_notify: bool,
}

fn main() {
    let cli = Cli::parse();
    cli.common.init_logging();

    if let Err(e) = run(&cli) {
        eprintln!("\n❌ {}\n", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.common.load_config()?;
    let store = cli.common.artifact_store(&config);
    let mut opened = cli.common.open_source()?;
    let now = cli.at.or(opened.latest).unwrap_or_else(Utc::now);

    let predictor = Predictor::new(&config, &store);
    let outcome = predictor.predict_from_source(opened.source.as_mut(), now)?;

    let decision = match outcome {
        PredictionOutcome::Decision(decision) => decision,
        PredictionOutcome::Unavailable(reason) => {
            println!("⏳ Forecast unavailable: {}. Try again later.", reason);
            return Ok(());
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        println!("🌊 Mun River Forecast - {}", decision.station_id);
        println!("=================================\n");
        println!("   As of:      {}", decision.as_of.format("%Y-%m-%d %H:%M UTC"));
        println!(
            "   Forecast:   {:.2} m MSL at {} (+{} h)",
            decision.predicted_level_m,
            decision.valid_at().format("%Y-%m-%d %H:%M UTC"),
            decision.horizon_hours
        );
        println!("   Status:     {} (tier {})", decision.status, decision.tier.level());
        if decision.is_overridden() {
            println!("   Model tier: {}", decision.model_tier.level());
            for reason in &decision.overrides {
                println!("   ⚠️  {}", reason);
            }
        }
        println!(
            "   Model:      v{} trained {}",
            decision.model_version,
            decision.model_trained_at.format("%Y-%m-%d %H:%M UTC")
        );
    }

    if !cli.no_notify && notify(&decision, &LogDispatcher)? {
        println!("\n📣 Alert dispatched");
    }

    Ok(())
}

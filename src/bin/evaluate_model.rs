//! Model Evaluation
//!
//! Offline diagnostics for the forecast model. Nothing here touches the
//! stored artifact.
//!
//! 1. Optional synthetic flood wave injected into the history
//! 2. Horizon sweep (1, 3, 6, 12, 24 h) on a chronological 80/20 split
//! 3. K-fold cross validation at the configured horizon
//! 4. Flash-rise scenario: an upstream jump the model has never seen,
//!    checked against the override rules
//!
//! Usage:
//!   cargo run --bin evaluate_model -- --readings export.json --simulate-flood
//!   cargo run --bin evaluate_model -- --database --folds 10

use chrono::{Duration, Utc};
use clap::Parser;
use flomon_forecast::analysis::series::prepare;
use flomon_forecast::analysis::simulation::{
    REFERENCE_FLASH_RISE_M, inject_flash_rise, inject_flood_waves, midpoint,
    reference_flood_waves,
};
use flomon_forecast::cli::CommonArgs;
use flomon_forecast::forecast::artifact::MemoryArtifactStore;
use flomon_forecast::forecast::predictor::Predictor;
use flomon_forecast::forecast::trainer::{
    DEFAULT_FOLDS, SWEEP_HORIZONS, Trainer, build_training_set, cross_validate, sweep_horizons,
};
use flomon_forecast::forecast::{PredictionOutcome, TrainOutcome};
use flomon_forecast::ingest::{InMemoryReadings, ReadingQuery, ReadingSource};

#[derive(Parser, Debug)]
#[command(name = "evaluate_model")]
#[command(about = "Cross-validate the forecast model and run flood scenarios")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = DEFAULT_FOLDS)]
    folds: usize,

    /// Inject the reference Gaussian flood wave before evaluating
    #[arg(long)]
    simulate_flood: bool,

    /// Upstream jump for the flash-rise scenario, metres
    #[arg(long, default_value_t = REFERENCE_FLASH_RISE_M)]
    flash_rise_m: f64,
}

fn main() {
    let cli = Cli::parse();
    cli.common.init_logging();

    println!("🔬 Flood Forecast Model Evaluation");
    println!("==================================\n");

    if let Err(e) = run(&cli) {
        eprintln!("\n❌ Evaluation failed: {}\n", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.common.load_config()?;
    let mut opened = cli.common.open_source()?;
    let mut readings = opened
        .source
        .fetch(&ReadingQuery::all(config.monitored_station_ids()))?;
    println!("📊 {} readings loaded", readings.len());

    if cli.simulate_flood {
        match (
            config.overrides.upstream_station.as_deref(),
            config.overrides.downstream_station.as_deref(),
            midpoint(&readings),
        ) {
            (Some(upstream), Some(downstream), Some(center)) => {
                let waves = reference_flood_waves(upstream, &config.target_station, downstream);
                readings = inject_flood_waves(&readings, &waves, center);
                println!("🌊 Flood wave injected, centred on {}", center.format("%Y-%m-%d %H:%M UTC"));
            }
            _ => println!("⚠️  Flood simulation needs upstream and downstream stations, skipped"),
        }
    }

    let layout = config.feature_layout();
    let table = prepare(&readings, &layout);
    println!("   {} aligned hourly rows\n", table.len());

    // --- Horizon sweep --------------------------------------------------------
    println!("🧪 Horizon sweep (chronological 80/20 split)");
    let sweep = sweep_horizons(&table, &config.target_station, &SWEEP_HORIZONS)?;
    for score in &sweep.scores {
        match score.metrics {
            Some(m) => println!(
                "   +{:02} h -> R² = {:.4} | MAE = {:.4} m ({} examples)",
                score.horizon_hours, m.r2, m.mae, score.examples
            ),
            None => println!(
                "   +{:02} h -> skipped ({} examples)",
                score.horizon_hours, score.examples
            ),
        }
    }
    if let Some(best) = sweep.best_horizon {
        println!(
            "   Best held-out horizon: {} h (production horizon stays {} h)",
            best, config.horizon_hours
        );
    }

    // --- Cross validation -----------------------------------------------------
    println!("\n📐 {}-fold cross validation at +{} h", cli.folds, config.horizon_hours);
    let examples = build_training_set(&table, &config.target_station, config.horizon_hours);
    match cross_validate(&examples, cli.folds)? {
        Some(cv) => {
            for (i, fold) in cv.folds.iter().enumerate() {
                println!("   Fold {}: R² = {:.4} | MAE = {:.4} m", i + 1, fold.r2, fold.mae);
            }
            println!("   Mean:   R² = {:.4} | MAE = {:.4} m", cv.mean_r2, cv.mean_mae);
        }
        None => println!("   Not enough examples ({}) for {} folds", examples.len(), cli.folds),
    }

    // --- Flash-rise scenario ----------------------------------------------------
    println!("\n⚡ Flash-rise scenario (+{:.2} m upstream in 1 h)", cli.flash_rise_m);
    let store = MemoryArtifactStore::new();
    let trainer = Trainer::new(&config, &store);
    if let TrainOutcome::InsufficientData(reason) = trainer.train(&readings, Utc::now())? {
        println!("   Skipped: {}", reason);
        return Ok(());
    }
    let Some(upstream) = config.overrides.upstream_station.as_deref() else {
        println!("   Skipped: no upstream station configured");
        return Ok(());
    };

    let Some(latest) = readings.iter().map(|r| r.recorded_at).max() else {
        return Ok(());
    };
    let window = ReadingQuery::recent(
        config.monitored_station_ids(),
        latest,
        config.recent_window_hours,
    );
    let recent = InMemoryReadings::new(readings.clone()).fetch(&window)?;
    let scenario = inject_flash_rise(&recent, upstream, cli.flash_rise_m);

    let predictor = Predictor::new(&config, &store);
    for (label, input) in [("baseline", &recent), ("flash rise", &scenario)] {
        match predictor.predict(input)? {
            PredictionOutcome::Decision(d) => println!(
                "   {:<10} {:.2} m at +{} h -> {} (model tier {}, final tier {})",
                label,
                d.predicted_level_m,
                d.horizon_hours,
                d.status,
                d.model_tier.level(),
                d.tier.level()
            ),
            PredictionOutcome::Unavailable(reason) => println!("   {:<10} unavailable: {}", label, reason),
        }
    }
    println!(
        "   Window: {} .. {}",
        (latest - Duration::hours(i64::from(config.recent_window_hours))).format("%Y-%m-%d %H:%M"),
        latest.format("%Y-%m-%d %H:%M UTC")
    );

    Ok(())
}

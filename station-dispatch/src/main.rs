use std::path::PathBuf;
use std::process::ExitCode;

use station_dispatch::config::DispatchConfig;
use station_dispatch::scenario::{Replay, Scenario, car_loads};
use station_dispatch::store::JsonStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("Usage: station-dispatch <scenario.json>");
        return ExitCode::from(2);
    };

    let config = DispatchConfig::from_env();
    let store = config.data_dir.clone().map(JsonStore::new);
    if let Some(store) = &store {
        println!("Persisting state under {}", store.root().display());
    }

    let scenario = match Scenario::load(&path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    println!(
        "Loaded {} stations, {} trains, {} events",
        scenario.stations.len(),
        scenario.trains.len(),
        scenario.events.len()
    );

    let mut replay = match Replay::new(&scenario, config, store) {
        Ok(replay) => replay,
        Err(e) => {
            eprintln!("Failed to set up replay: {e}");
            return ExitCode::FAILURE;
        }
    };
    let decisions = match replay.run(&scenario.events).await {
        Ok(decisions) => decisions,
        Err(e) => {
            eprintln!("Replay failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    for decision in &decisions {
        println!("{decision}");
    }
    println!();
    for (train, _) in replay.dispatcher().trains() {
        for (car, aboard) in car_loads(replay.host(), train) {
            println!("{train} car {car}: {aboard} aboard");
        }
    }
    ExitCode::SUCCESS
}

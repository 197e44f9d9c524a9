use std::env;

use explorer_app::{AppState, DEFAULT_CONFIG_FILE, init_tracing};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("usage: refresh-rollups [config.toml]");
        std::process::exit(2);
    }
    let config_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CONFIG_FILE);

    let state = AppState::from_config_file(config_path).unwrap_or_else(|err| {
        eprintln!("failed to load {}: {}", config_path, err);
        std::process::exit(1);
    });
    if let Err(err) = init_tracing(&state.config.log_filter) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
    if let Err(err) = state.setup_db() {
        eprintln!("failed to prepare {}: {}", state.config.db_path.display(), err);
        std::process::exit(1);
    }

    let counts = state.services.rollups.refresh().unwrap_or_else(|err| {
        eprintln!("refresh failed: {}", err);
        std::process::exit(1);
    });
    match serde_json::to_string_pretty(&counts) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            eprintln!("failed to encode counts: {}", err);
            std::process::exit(1);
        }
    }
}

use std::env;
use std::process;
use tripwire::{config::Settings, init_server, init_tracing};

#[tokio::main]
async fn main() {
    init_tracing();

    // Config file path from command line or the default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/tripwire.yaml".to_string());

    let settings = match Settings::from_file(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: tripwire [config_file]");
            process::exit(1);
        }
    };

    if let Err(e) = init_server(settings).await {
        eprintln!("Server error: {:#}", e);
        process::exit(1);
    }
}

use std::sync::Arc;

use clap::Parser;
use petnamer::app::NamerApp;
use petnamer::config::{AppConfig, ConfigArgs, ConfigError};
use petnamer::net::auth::GoTrueClient;
use petnamer::net::generation::EventClient;
use petnamer::net::names::NamesApi;
use petnamer::terminal;
use tokio::io::BufReader;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("http client init failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "petnamer", about = "Suggest and save names for your pet")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // stdout belongs to the interactive view.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = AppConfig::from_args(cli.config)?;
    let http = petnamer::net::http_client(config.timeouts)?;

    let auth = Arc::new(GoTrueClient::new(http.clone(), &config.auth));
    auth.restore_session().await;
    let generator = Arc::new(EventClient::new(http.clone(), config.events_url.clone(), config.app_id.clone()));
    let store = Arc::new(NamesApi::new(http, config.api_base_url.clone()));

    tracing::info!(api = %config.api_base_url, events = %config.events_url, "petnamer starting");

    let app = NamerApp::new(auth, generator, store);
    app.mount().await;
    let result = terminal::run(&app, BufReader::new(tokio::io::stdin()), std::io::stdout()).await;
    app.unmount();
    result?;
    Ok(())
}

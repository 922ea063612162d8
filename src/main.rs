//! calibre-opds server entry point.

use calibre_opds::{
    config::{Cli, Command, Config},
    db::Database,
    server,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force),
        Some(Command::Serve {
            bind,
            port,
            library,
        }) => cmd_serve(config, bind, port, library).await,
        None => cmd_serve(config, None, None, None).await,
    }
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nSet [library] path to your Calibre library, then run: calibre-opds serve");

    Ok(())
}

/// Start the HTTP server.
async fn cmd_serve(
    config: Config,
    bind: Option<SocketAddr>,
    port: Option<u16>,
    library: Option<PathBuf>,
) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calibre_opds=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config.finalize(bind, port, library)?;
    let database_path = config.library.database_path();

    tracing::info!(
        bind = %config.server.bind,
        library = %config.library.path.display(),
        database = %database_path.display(),
        pool_size = config.database.pool_size,
        "Starting calibre-opds server"
    );

    let db = Database::open(&database_path, config.database.pool_size)?;
    let bind = config.server.bind;
    let state = server::AppState::new(config, db)?;
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

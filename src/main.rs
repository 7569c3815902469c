use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use picture_drop::{Config, create_app, pictures::MetadataRepository, startup_checks};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Overrides `app.log_level` from the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// List stored image records
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let config = load_config(&cli.config)?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.app.log_level);
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if config_found {
        info!("Configuration loaded from: {:?}", cli.config);
    } else {
        info!("Config file not found at {:?}, using defaults", cli.config);
    }

    match cli.command {
        Some(Commands::List) => list_records(&config).await,
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(config, port, host, quit_after).await,
        None => run_server(config, None, None, None).await,
    }
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        let config_content = std::fs::read_to_string(config_path)?;
        Ok(Config::from_toml(&config_content)?)
    } else {
        Ok(Config::default())
    }
}

async fn list_records(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let metadata_file = &config.storage.metadata_file;
    let records = MetadataRepository::read_document(metadata_file).await?;
    if records.is_empty() {
        println!("No images stored in {}", metadata_file.display());
    } else {
        println!("Stored images:");
        for record in &records {
            println!("  {}  {}  {}", record.id, record.title, record.file_path);
        }
    }

    Ok(())
}

async fn run_server(
    config: Config,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);
    info!("Image directory: {:?}", config.storage.image_directory);
    info!("Metadata document: {:?}", config.storage.metadata_file);
    info!("Template directory: {:?}", config.templates.directory);

    match startup_checks::perform_startup_checks(&config).await {
        Ok(()) => info!("All startup checks passed"),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }

            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
            }
        }
    }

    let app = create_app(config.clone()).await?;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["picture-drop"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "picture-drop",
            "--config",
            "custom.toml",
            "serve",
            "--port",
            "8080",
            "--host",
            "0.0.0.0",
            "--quit-after",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Some(Commands::Serve {
                port,
                host,
                quit_after,
            }) => {
                assert_eq!(port, Some(8080));
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(quit_after, Some(5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_list_accepts_global_flags() {
        let cli = Cli::try_parse_from(["picture-drop", "list", "-l", "debug"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List)));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}

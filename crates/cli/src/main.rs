use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "linerelay")]
#[command(about = "LINE to Gemini message relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config.json, system_instruction.md).
    Init {
        /// Config file path (default: LINERELAY_CONFIG_PATH or ~/.linerelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Serve the LINE webhook (POST /callback) and relay text messages to the model.
    Serve {
        /// Config file path (default: LINERELAY_CONFIG_PATH or ~/.linerelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from PORT env, config, or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // .env first so RUST_LOG and the secrets may live there
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match dotenv {
        Ok(path) => log::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("failed to read .env file: {}", e),
    }

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("linerelay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let mut settings = lib::config::Settings::resolve(config, &path)?;
    if let Some(p) = port {
        settings.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (model {})",
        settings.bind,
        settings.port,
        settings.model_name
    );
    lib::gateway::run_gateway(settings).await
}

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hotline")]
#[command(about = "Hotline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config and an empty alert group directory).
    Init {
        /// Config file path (default: HOTLINE_CONFIG_PATH or ~/.hotline/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the gateway that receives Slack interactions and dispatches them to steps.
    Gateway {
        /// Config file path (default: HOTLINE_CONFIG_PATH or ~/.hotline/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 15152)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print the routing table in match order.
    Routes,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("hotline {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Routes) => print_routes(),
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(hotline::config::default_config_path);
    let dir = hotline::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = hotline::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    hotline::gateway::run_gateway(config, path).await
}

fn print_routes() {
    let table = hotline::routing::RoutingTable::builtin();
    for (i, entry) in table.entries().iter().enumerate() {
        let required: Vec<&str> = entry
            .step
            .required_capabilities()
            .into_iter()
            .map(|c| c.as_str())
            .collect();
        println!(
            "{:>2}  {:?}\n    -> {} [{}]",
            i,
            entry.criteria,
            entry.step.routing_uid(),
            if required.is_empty() {
                "no gate".to_string()
            } else {
                required.join(", ")
            }
        );
    }
}

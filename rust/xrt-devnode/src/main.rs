// XRT dev node - Entry point

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use xrt_devnode::cli::{Cli, Commands};
use xrt_devnode::types::DevAccount;
use xrt_devnode::{run_node, NodeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.verbose {
        "debug"
    } else {
        &cli.log_level
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    match cli.command {
        Commands::Run(cmd) => {
            let config = NodeConfig::from_run_cmd(&cmd).map_err(|e| {
                error!("Configuration error: {}", e);
                anyhow::anyhow!("Configuration error: {}", e)
            })?;

            info!("Starting xrt-devnode v{}", env!("CARGO_PKG_VERSION"));

            if let Err(e) = run_node(config).await {
                error!("Node error: {}", e);
                return Err(anyhow::anyhow!("Node error: {}", e));
            }
        }

        Commands::Accounts(cmd) => {
            for index in 0..cmd.count {
                let account = DevAccount::from_seed(&cmd.seed, index);
                println!("({}) {}", index, account.address());
            }
        }
    }

    Ok(())
}

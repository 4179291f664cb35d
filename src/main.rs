use anyhow::Result;
use tracing::{error, info};

mod browser;
mod cli;
mod crawler;
mod error;
mod storage;
mod utils;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    // Deployment settings may come from a .env file next to the binary
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = cli::parse_args();

    utils::init_logging(args.verbose, args.log_path())?;

    info!("Starting carlot v{}", env!("CARGO_PKG_VERSION"));

    // Process commands
    match cli::process_command(args).await {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            Err(e)
        }
    }
}

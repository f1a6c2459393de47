use clap::Parser;
use color_eyre::Result;
use site_images::{cli::Cli, run_cli};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    pretty_env_logger::init();
    color_eyre::install()?;
    run_cli(Cli::parse()).await
}

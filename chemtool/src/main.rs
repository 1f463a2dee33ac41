use anyhow::Result;
use chemtool::{cli::Cli, commands::ConfigHandler};
use clap::Parser;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    log::debug!("{cli:?}");

    let mut handler = ConfigHandler::new(&cli)?;
    handler.handle(cli.command)
}

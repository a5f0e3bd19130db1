mod config;
mod simulate;

use anyhow::Result;
use clap::ArgMatches;

pub async fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("simulate", sub_m)) => simulate::handle(sub_m).await,
        Some(("config", sub_m)) => config::handle(sub_m),
        _ => anyhow::bail!("Unknown command. Run 'buildgrid --help' for usage."),
    }
}

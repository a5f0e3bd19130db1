use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::commands::{
    config,
    simulate::{self, SimulateOptions},
};

fn count(matches: &ArgMatches, name: &str) -> Result<usize> {
    matches
        .get_one::<usize>(name)
        .copied()
        .with_context(|| format!("Missing --{name}"))
}

pub async fn handle(matches: &ArgMatches) -> Result<()> {
    let options = SimulateOptions {
        jobs: count(matches, "jobs")?,
        agents: count(matches, "agents")?,
        builds_per_agent: count(matches, "builds-per-agent")?,
        cancel: count(matches, "cancel")?,
        fail_every: count(matches, "fail-every")?,
        build_millis: matches
            .get_one::<u64>("build-millis")
            .copied()
            .unwrap_or_default(),
        pause: matches
            .get_many::<String>("pause")
            .map(|names| names.cloned().collect())
            .unwrap_or_default(),
        pause_after_failures: count(matches, "pause-after-failures")?,
    };
    let path = matches.get_one::<PathBuf>("config");
    let grid_config = config::load(path.map(PathBuf::as_path))?;

    let summary = simulate::run(&options, &grid_config).await?;
    simulate::print_summary(&summary);
    Ok(())
}

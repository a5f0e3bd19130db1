use std::path::PathBuf;

use anyhow::Result;
use clap::ArgMatches;

use crate::commands::config;

pub fn handle(matches: &ArgMatches) -> Result<()> {
    let path = matches.get_one::<PathBuf>("config");
    let rendered = config::run(path.map(PathBuf::as_path))?;
    print!("{rendered}");
    Ok(())
}

pub mod handlers;
pub mod setup;

use clap::{value_parser, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("buildgrid")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build-job coordination on an in-process data grid")
        .subcommand_required(true)
        .subcommand(cmd_simulate())
        .subcommand(cmd_config())
}

fn arg_config() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .value_name("PATH")
        .value_parser(value_parser!(std::path::PathBuf))
        .help("Config file (default: per-user buildgrid/config.toml)")
}

fn cmd_simulate() -> Command {
    Command::new("simulate")
        .about("Run scheduler, agents and result processing in-process")
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .value_parser(value_parser!(usize))
                .default_value("20")
                .help("Jobs to submit"),
        )
        .arg(
            Arg::new("agents")
                .long("agents")
                .short('a')
                .value_parser(value_parser!(usize))
                .default_value("3")
                .help("Build agents to start"),
        )
        .arg(
            Arg::new("builds-per-agent")
                .long("builds-per-agent")
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Concurrent builds each agent accepts"),
        )
        .arg(
            Arg::new("cancel")
                .long("cancel")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("Cancel this many jobs before agents start"),
        )
        .arg(
            Arg::new("fail-every")
                .long("fail-every")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("Fail every n-th job (0 = never)"),
        )
        .arg(
            Arg::new("build-millis")
                .long("build-millis")
                .value_parser(value_parser!(u64))
                .default_value("5")
                .help("Simulated build duration in milliseconds"),
        )
        .arg(
            Arg::new("pause")
                .long("pause")
                .value_name("AGENT")
                .action(ArgAction::Append)
                .help("Pause an agent (e.g. agent-0) before it starts; repeatable"),
        )
        .arg(
            Arg::new("pause-after-failures")
                .long("pause-after-failures")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("Agents pause themselves after this many failures in a row (0 = never)"),
        )
        .arg(arg_config())
}

fn cmd_config() -> Command {
    Command::new("config")
        .about("Print the resolved configuration as TOML")
        .arg(arg_config())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn simulate_defaults() {
        let matches = build_cli().get_matches_from(["buildgrid", "simulate"]);
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "simulate");
        assert_eq!(sub.get_one::<usize>("jobs"), Some(&20));
        assert_eq!(sub.get_one::<usize>("agents"), Some(&3));
        assert!(sub.get_one::<std::path::PathBuf>("config").is_none());
    }

    #[test]
    fn pause_is_repeatable() {
        let matches = build_cli().get_matches_from([
            "buildgrid",
            "simulate",
            "--pause",
            "agent-0",
            "--pause",
            "agent-2",
        ]);
        let (_, sub) = matches.subcommand().unwrap();
        let paused: Vec<&String> = sub.get_many::<String>("pause").unwrap().collect();
        assert_eq!(paused, ["agent-0", "agent-2"]);
        assert_eq!(sub.get_one::<usize>("pause-after-failures"), Some(&0));
    }

    #[test]
    fn rejects_non_numeric_jobs() {
        let result = build_cli().try_get_matches_from(["buildgrid", "simulate", "--jobs", "many"]);
        assert!(result.is_err());
    }
}

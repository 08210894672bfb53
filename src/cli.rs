use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gardenops", version, about = "Zone irrigation controller")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to gardenops.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (database and watering log)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the controller and run until interrupted
    Run,
    /// Validate config, test connections and evaluate every zone once
    Check,
    /// Run one watering cycle now, ignoring the schedule
    Cycle,
    /// Print the evaluation of one zone as JSON
    Evaluate {
        #[arg(short, long)]
        zone: u32,
    },
    /// Water one zone now, unless an emergency is detected
    Water {
        #[arg(short, long)]
        zone: u32,
        /// Override the recommended duration
        #[arg(short, long)]
        minutes: Option<f64>,
    },
    /// Print controller state and the latest health snapshot
    Status,
}

impl Commands {
    /// Whether the command may switch relays. Other commands run without
    /// claiming any GPIO, so they are safe next to a running daemon.
    pub fn drives_relays(&self) -> bool {
        matches!(self, Commands::Run | Commands::Cycle | Commands::Water { .. })
    }
}

impl Cli {
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Run)
    }

    /// Filter used when `RUST_LOG` is unset and the config names no level
    pub fn default_log_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_is_the_default_command() {
        let cli = Cli::parse_from(["gardenops"]);
        assert_eq!(cli.command(), &Commands::Run);
        assert_eq!(cli.default_log_level(), None);
    }

    #[test]
    fn parses_water_command() {
        let cli = Cli::parse_from(["gardenops", "-vv", "water", "--zone", "2", "--minutes", "7.5"]);
        assert_eq!(
            cli.command(),
            &Commands::Water {
                zone: 2,
                minutes: Some(7.5)
            }
        );
        assert_eq!(cli.default_log_level(), Some("trace"));
    }

    #[test]
    fn only_watering_commands_drive_relays() {
        let drives = |args: &[&str]| Cli::parse_from(args).command().drives_relays();
        assert!(drives(&["gardenops"]));
        assert!(drives(&["gardenops", "cycle"]));
        assert!(drives(&["gardenops", "water", "-z", "1"]));
        assert!(!drives(&["gardenops", "status"]));
        assert!(!drives(&["gardenops", "check"]));
        assert!(!drives(&["gardenops", "evaluate", "--zone", "1"]));
    }

    #[test]
    fn evaluate_requires_zone() {
        assert!(Cli::try_parse_from(["gardenops", "evaluate"]).is_err());
    }
}

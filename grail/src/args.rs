//! Command line parsing for the battle simulator.

use grail_core::InitiativeOrder;
use std::path::PathBuf;

/// Options for one simulator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub seed: Option<u64>,
    /// Roster file; the built-in demo roster when absent.
    pub roster: Option<PathBuf>,
    pub max_turns: u32,
    pub order: Option<InitiativeOrder>,
    /// Print the roster as JSON instead of fighting.
    pub dump_roster: bool,
    /// Print events as JSON lines.
    pub json: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            roster: None,
            max_turns: 200,
            order: None,
            dump_roster: false,
            json: false,
        }
    }
}

pub fn parse_config_from_args(args: &[String]) -> RunConfig {
    let mut config = RunConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                if let Some(seed) = args.get(i + 1) {
                    config.seed = seed.parse().ok();
                    i += 1;
                }
            }
            "--roster" => {
                if let Some(path) = args.get(i + 1) {
                    config.roster = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            "--max-turns" => {
                if let Some(turns) = args.get(i + 1) {
                    config.max_turns = turns.parse().unwrap_or(config.max_turns);
                    i += 1;
                }
            }
            "--order" => {
                if let Some(order) = args.get(i + 1) {
                    config.order = parse_order(order);
                    i += 1;
                }
            }
            "--dump-roster" => config.dump_roster = true,
            "--json" => config.json = true,
            _ => {}
        }
        i += 1;
    }

    config
}

fn parse_order(s: &str) -> Option<InitiativeOrder> {
    match s.to_lowercase().as_str() {
        "asc" | "ascending" => Some(InitiativeOrder::Ascending),
        "desc" | "descending" => Some(InitiativeOrder::Descending),
        _ => None,
    }
}

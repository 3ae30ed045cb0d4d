//! Headless tactics battle simulator.
//!
//! Loads a roster (or the built-in demo), lets the auto-battler play both
//! sides and prints the combat log.
//!
//! ```bash
//! RUST_LOG=grail_core=debug cargo run -p grail -- --seed 7 --max-turns 100
//! ```

mod args;

use grail_core::roster::demo_roster;
use grail_core::{AutoBattle, Roster};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = args::parse_config_from_args(&args);

    let mut roster = match &config.roster {
        Some(path) => Roster::load(path)?,
        None => demo_roster(),
    };
    if let Some(seed) = config.seed {
        roster.config.seed = Some(seed);
    }
    if let Some(order) = config.order {
        roster.config.initiative_order = order;
    }

    if config.dump_roster {
        println!("{}", roster.to_json()?);
        return Ok(());
    }

    println!("=== {} ===", roster.config.name);
    let (mut encounter, _) = roster.into_encounter()?;
    let report = AutoBattle::new(config.max_turns).run(&mut encounter)?;

    for event in encounter.drain_events() {
        if config.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{event}");
        }
    }

    println!();
    match report.outcome {
        Some(outcome) => println!("Result: {outcome:?}"),
        None => println!("Result: undecided after {} turns", report.turns),
    }
    println!("Rounds: {}  Turns: {}", report.rounds, report.turns);
    for unit in encounter.units() {
        let status = if unit.is_alive() { "" } else { " (down)" };
        println!(
            "  {:<16} {:<5} HP {:>3}/{:<3} MP {:>3}{status}",
            unit.name, unit.team, unit.hp, unit.max_hp, unit.mp
        );
    }
    Ok(())
}

fn print_help() {
    println!("Grail - headless tactics battle simulator");
    println!();
    println!("USAGE:");
    println!("  grail [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help            Show this help message");
    println!("  --seed <N>            Seed the dice (default: entropy)");
    println!("  --roster <PATH>       Load a roster JSON file (default: built-in demo)");
    println!("  --max-turns <N>       Stop after N turns (default: 200)");
    println!("  --order <ORDER>       Initiative order: ascending or descending");
    println!("  --json                Print events as JSON lines");
    println!("  --dump-roster         Print the roster as JSON and exit");
    println!();
    println!("Logging is controlled by RUST_LOG, e.g. RUST_LOG=grail_core=debug");
    println!();
    println!("EXAMPLES:");
    println!("  grail --seed 7");
    println!("  grail --dump-roster > honnoji.json");
    println!("  grail --roster honnoji.json --order descending");
}

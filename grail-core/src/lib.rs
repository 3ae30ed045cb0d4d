//! Turn-based tactics combat engine.
//!
//! This crate provides:
//! - Units with a derived parameter graph and rank-scaled gear
//! - Initiative, rounds and an action economy
//! - Attacks, spells, skills and noble phantasms resolved through
//!   effect hooks
//! - Servant loadouts, JSON rosters and a headless auto-battler
//!
//! # Quick Start
//!
//! ```ignore
//! use grail_core::{AutoBattle, Roster};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let roster = Roster::load("roster.json")?;
//!     let (mut encounter, _units) = roster.into_encounter()?;
//!
//!     let report = AutoBattle::new(200).run(&mut encounter)?;
//!     for event in encounter.drain_events() {
//!         println!("{event}");
//!     }
//!     println!("{:?} after {} rounds", report.outcome, report.rounds);
//!     Ok(())
//! }
//! ```

pub mod abilities;
pub mod actions;
pub mod dice;
pub mod effects;
pub mod encounter;
pub mod error;
pub mod events;
pub mod headless;
pub mod instance;
pub mod items;
pub mod params;
pub mod roster;
pub mod servant;
pub mod spells;
pub mod testing;
pub mod turn;
pub mod world;

// Primary public API
pub use abilities::{Ability, AbilityOutcome, ActionType, SkillKind};
pub use dice::{Dice, GameRng, RandomSource, Reroll};
pub use effects::{AbilityEffect, EffectKind, StackPolicy, Timing};
pub use encounter::{Encounter, EncounterConfig};
pub use error::CombatError;
pub use events::{CombatEvent, EncounterOutcome};
pub use headless::{AutoBattle, BattleReport};
pub use instance::noble_phantasm::{NoblePhantasm, PhantasmActivation};
pub use params::Stat;
pub use roster::{Roster, UnitBuilder, UnitTemplate};
pub use servant::Servant;
pub use spells::{CastOutcome, Spell, SpellKind};
pub use testing::{ScriptedDice, TestHarness};
pub use turn::{InitiativeOrder, TurnState};
pub use world::{Rank, Team, Unit, UnitClass, UnitId};

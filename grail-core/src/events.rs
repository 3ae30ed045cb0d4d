//! Combat events.
//!
//! Every state change the core makes is recorded here as a [`CombatEvent`].
//! Presentation layers drain the log after each call; the core never waits on
//! them.

use crate::params::Stat;
use crate::world::{Team, UnitId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an encounter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncounterOutcome {
    /// Every Evil unit is down.
    Victory,
    /// Every Good unit is down.
    GameOver,
}

impl fmt::Display for EncounterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncounterOutcome::Victory => write!(f, "Victory"),
            EncounterOutcome::GameOver => write!(f, "Game Over"),
        }
    }
}

/// Something that happened during an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    InitiativeRolled {
        unit: UnitId,
        roll: i32,
    },
    RoundStarted {
        round: u32,
    },
    RoundEnded {
        round: u32,
    },
    TurnStarted {
        unit: UnitId,
        actions: i32,
    },
    TurnEnded {
        unit: UnitId,
    },
    AttackResolved {
        source: UnitId,
        target: UnitId,
        weapon: Option<String>,
        roll: i32,
        evasion: i32,
        hit: bool,
        critical: bool,
        damage: Option<i32>,
    },
    SpellResolved {
        source: UnitId,
        target: UnitId,
        spell: String,
        hit: bool,
        voided: bool,
        damage: Option<i32>,
    },
    NoblePhantasmResolved {
        source: UnitId,
        target: UnitId,
        name: String,
        save_cleared: bool,
        damage: Option<i32>,
    },
    HealthChanged {
        unit: UnitId,
        amount: i32,
        hp: i32,
        max_hp: i32,
    },
    ManaChanged {
        unit: UnitId,
        amount: i32,
        mp: i32,
    },
    ParameterChanged {
        unit: UnitId,
        stat: Stat,
        old: i32,
        new: i32,
    },
    EffectApplied {
        unit: UnitId,
        effect: String,
        source: UnitId,
    },
    EffectResisted {
        unit: UnitId,
        effect: String,
        roll: i32,
        dc: i32,
    },
    EffectRemoved {
        unit: UnitId,
        effect: String,
    },
    CastRefused {
        unit: UnitId,
        name: String,
        cost: i32,
    },
    UnitJoined {
        unit: UnitId,
        name: String,
        team: Team,
    },
    UnitKilled {
        unit: UnitId,
        name: String,
    },
    EncounterEnded {
        outcome: EncounterOutcome,
    },
}

impl fmt::Display for CombatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombatEvent::InitiativeRolled { unit, roll } => {
                write!(f, "{} rolls {} for initiative", unit, roll)
            }
            CombatEvent::RoundStarted { round } => write!(f, "=== Round {} ===", round),
            CombatEvent::RoundEnded { round } => write!(f, "Round {} ends", round),
            CombatEvent::TurnStarted { unit, actions } => {
                write!(f, "{}'s turn ({} actions)", unit, actions)
            }
            CombatEvent::TurnEnded { unit } => write!(f, "{} ends their turn", unit),
            CombatEvent::AttackResolved {
                source,
                target,
                weapon,
                roll,
                evasion,
                hit,
                critical,
                damage,
            } => {
                let weapon = weapon.as_deref().unwrap_or("bare hands");
                if !hit {
                    return write!(
                        f,
                        "{} attacks {} with {}: {} vs {} misses",
                        source, target, weapon, roll, evasion
                    );
                }
                let crit = if *critical { " (critical)" } else { "" };
                match damage {
                    Some(d) => write!(
                        f,
                        "{} hits {} with {}{} for {} damage",
                        source, target, weapon, crit, d
                    ),
                    None => write!(
                        f,
                        "{} hits {} with {}{} but deals no damage",
                        source, target, weapon, crit
                    ),
                }
            }
            CombatEvent::SpellResolved {
                source,
                target,
                spell,
                hit,
                voided,
                damage,
            } => {
                if !hit {
                    write!(f, "{}'s {} misses {}", source, spell, target)
                } else if *voided {
                    write!(f, "{} resists {}'s {}", target, source, spell)
                } else if let Some(d) = damage {
                    write!(f, "{}'s {} deals {} to {}", source, spell, d, target)
                } else {
                    write!(f, "{}'s {} takes hold of {}", source, spell, target)
                }
            }
            CombatEvent::NoblePhantasmResolved {
                source,
                target,
                name,
                save_cleared,
                damage,
            } => {
                let save = if *save_cleared { " (halved)" } else { "" };
                match damage {
                    Some(d) => write!(
                        f,
                        "{} unleashes {} on {} for {}{}",
                        source, name, target, d, save
                    ),
                    None => write!(f, "{} unleashes {} on {} to no effect", source, name, target),
                }
            }
            CombatEvent::HealthChanged {
                unit,
                amount,
                hp,
                max_hp,
            } => write!(f, "{} HP {:+} ({}/{})", unit, amount, hp, max_hp),
            CombatEvent::ManaChanged { unit, amount, mp } => {
                write!(f, "{} MP {:+} ({})", unit, amount, mp)
            }
            CombatEvent::ParameterChanged {
                unit,
                stat,
                old,
                new,
            } => write!(f, "{} {} {} -> {}", unit, stat, old, new),
            CombatEvent::EffectApplied {
                unit,
                effect,
                source,
            } => write!(f, "{} gains {} from {}", unit, effect, source),
            CombatEvent::EffectResisted {
                unit,
                effect,
                roll,
                dc,
            } => write!(f, "{} resists {} ({} vs DC {})", unit, effect, roll, dc),
            CombatEvent::EffectRemoved { unit, effect } => {
                write!(f, "{} loses {}", unit, effect)
            }
            CombatEvent::CastRefused { unit, name, cost } => {
                write!(f, "{} cannot pay {} MP for {}", unit, cost, name)
            }
            CombatEvent::UnitJoined { unit, name, team } => {
                write!(f, "{} ({}) joins the {} side", name, unit, team)
            }
            CombatEvent::UnitKilled { unit, name } => write!(f, "{} ({}) falls", name, unit),
            CombatEvent::EncounterEnded { outcome } => write!(f, "*** {} ***", outcome),
        }
    }
}

/// Ordered log of events not yet consumed by presentation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<CombatEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CombatEvent) {
        self.events.push(event);
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CombatEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

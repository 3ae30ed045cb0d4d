//! Headless play: a simple policy that drives every unit until one team
//! is wiped out or the turn limit runs out.

use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::EncounterOutcome;
use crate::instance::noble_phantasm::PhantasmActivation;
use crate::spells::CastOutcome;
use crate::world::UnitId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What a unit decided to do with one of its actions.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Choice {
    NoblePhantasm(Vec<UnitId>),
    Cast(usize, Vec<UnitId>),
    Attack(UnitId),
    Pass,
}

/// Summary of a headless battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    /// `None` when the turn limit ran out first.
    pub outcome: Option<EncounterOutcome>,
    pub rounds: u32,
    pub turns: u32,
}

/// Greedy policy: phantasm when fresh and affordable, otherwise the first
/// affordable damaging spell, otherwise hit the weakest hostile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoBattle {
    pub max_turns: u32,
}

impl Default for AutoBattle {
    fn default() -> Self {
        Self { max_turns: 200 }
    }
}

impl AutoBattle {
    pub fn new(max_turns: u32) -> Self {
        Self { max_turns }
    }

    /// Run the encounter, starting it if needed.
    pub fn run(&self, enc: &mut Encounter) -> Result<BattleReport, CombatError> {
        if !enc.is_started() {
            enc.start()?;
        }

        let mut turns = 0;
        while !enc.is_over() && turns < self.max_turns {
            let Some(unit) = enc.current_unit() else {
                break;
            };
            self.take_turn(enc, unit)?;
            turns += 1;
        }

        let report = BattleReport {
            outcome: enc.outcome(),
            rounds: enc.round(),
            turns,
        };
        info!(
            outcome = ?report.outcome,
            rounds = report.rounds,
            turns = report.turns,
            "battle finished"
        );
        Ok(report)
    }

    /// Act until the unit's turn is over.
    pub fn take_turn(&self, enc: &mut Encounter, unit: UnitId) -> Result<(), CombatError> {
        // Every successful choice spends at least one action.
        let budget = enc.unit(unit)?.max_actions.max(1) + 1;
        for _ in 0..budget {
            if enc.is_over() || enc.current_unit() != Some(unit) {
                return Ok(());
            }
            let choice = self.choose(enc, unit)?;
            debug!(unit = %unit, ?choice, "auto choice");
            if !self.perform(enc, unit, choice)? {
                break;
            }
        }
        if !enc.is_over() && enc.current_unit() == Some(unit) {
            enc.end_turn(unit)?;
        }
        Ok(())
    }

    fn choose(&self, enc: &Encounter, unit: UnitId) -> Result<Choice, CombatError> {
        let hostiles = enc.hostiles_of(unit)?;
        let Some(weakest) = weakest(enc, &hostiles)? else {
            return Ok(Choice::Pass);
        };
        let me = enc.unit(unit)?;

        if let Some(np) = &me.noble_phantasm {
            if enc.action_usage(unit)? && me.mp >= np.mp_cost() {
                return Ok(Choice::NoblePhantasm(hostiles));
            }
        }

        let summoned = enc
            .living_units()
            .any(|id| enc.unit(id).map(|u| u.summoner == Some(unit)).unwrap_or(false));
        for (index, spell) in me.spells.iter().enumerate() {
            if me.mp < spell.mp_cost() {
                continue;
            }
            if spell.is_summon() && !summoned {
                return Ok(Choice::Cast(index, Vec::new()));
            }
            if spell.damage_dealing {
                let targets = if spell.area {
                    hostiles.clone()
                } else {
                    vec![weakest]
                };
                return Ok(Choice::Cast(index, targets));
            }
        }

        Ok(Choice::Attack(weakest))
    }

    /// Carry out a choice. Returns false when nothing was spent.
    fn perform(&self, enc: &mut Encounter, unit: UnitId, choice: Choice) -> Result<bool, CombatError> {
        match choice {
            Choice::NoblePhantasm(targets) => Ok(matches!(
                enc.noble_phantasm(unit, &targets)?,
                PhantasmActivation::Released(_)
            )),
            Choice::Cast(index, targets) => Ok(!matches!(
                enc.cast_spell(unit, index, &targets)?,
                CastOutcome::Refused { .. } | CastOutcome::Skipped
            )),
            Choice::Attack(target) => {
                enc.attack(unit, target)?;
                Ok(true)
            }
            Choice::Pass => Ok(false),
        }
    }
}

/// The living hostile with the least HP, lowest id on ties.
fn weakest(enc: &Encounter, candidates: &[UnitId]) -> Result<Option<UnitId>, CombatError> {
    let mut best: Option<(i32, UnitId)> = None;
    for &id in candidates {
        let unit = enc.unit(id)?;
        if !unit.is_alive() {
            continue;
        }
        if best.map_or(true, |(hp, _)| unit.hp < hp) {
            best = Some((unit.hp, id));
        }
    }
    Ok(best.map(|(_, id)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::demo_roster;
    use crate::testing::TestHarness;
    use crate::world::Team;

    #[test]
    fn test_auto_battle_stops_at_turn_limit() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        let ghoul = harness.spawn_sample("Ghoul", Team::Evil);
        // All later dice show 1, so no unarmed blow clears Evasion 10.
        harness.dice.queue(&[3, 3, 3, 1, 1, 1]);

        let report = AutoBattle::new(50).run(&mut harness.encounter).unwrap();
        assert_eq!(report.outcome, None);
        assert_eq!(report.turns, 50);
        assert_eq!(harness.hp(hero).0, 25);
        assert_eq!(harness.hp(ghoul).0, 25);
    }

    #[test]
    fn test_auto_battle_attacks_weakest() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        let tough = harness.spawn_sample("Tough", Team::Evil);
        let frail = harness.spawn_sample("Frail", Team::Evil);
        harness.encounter.unit_mut(frail).unwrap().hp = 2;
        // Initiative: Hero 3, Tough 18, Frail 18.
        harness.dice.queue(&[1, 1, 1, 6, 6, 6, 6, 6, 6]);
        harness.encounter.start().unwrap();
        assert_eq!(harness.encounter.current_unit(), Some(hero));

        // Unarmed blows roll twice and keep the lower: hit on 18, no
        // crit, 4 damage on the d4.
        harness.dice.queue(&[6, 6, 6, 6, 6, 6, 1, 1, 1, 4]);
        AutoBattle::default()
            .take_turn(&mut harness.encounter, hero)
            .unwrap();
        assert!(!harness.encounter.unit(frail).unwrap().is_alive());
        assert_eq!(harness.encounter.unit(tough).unwrap().hp, 25);
        assert_ne!(harness.encounter.current_unit(), Some(hero));
    }

    #[test]
    fn test_demo_roster_runs_to_completion_or_limit() {
        let mut roster = demo_roster();
        roster.config.seed = Some(42);
        let (mut enc, _) = roster.into_encounter().unwrap();
        let report = AutoBattle::new(300).run(&mut enc).unwrap();
        assert!(report.turns <= 300);
        assert_eq!(report.outcome.is_some(), enc.is_over());
    }
}

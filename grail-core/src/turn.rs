//! Turn scheduling.
//!
//! Units act one at a time in initiative order. The scheduler walks a
//! cursor over the order, wrapping into a new round when it runs off the
//! end, and goes terminal the moment one team has no living units left.

use crate::dice::Reroll;
use crate::effects::Timing;
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::{CombatEvent, EncounterOutcome};
use crate::params::Stat;
use crate::world::{Team, Unit, UnitId};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TurnState {
    #[default]
    RollingInitiative,
    RoundStart,
    UnitTurn(UnitId),
    GameOver,
    Victory,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::GameOver | TurnState::Victory)
    }
}

/// Which end of the initiative range acts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InitiativeOrder {
    /// Lowest initiative first.
    #[default]
    Ascending,
    Descending,
}

/// Turn order bookkeeping. Transitions live on [`Encounter`] because they
/// fire effect hooks.
#[derive(Debug, Clone, Default)]
pub struct TurnScheduler {
    state: TurnState,
    ordering: InitiativeOrder,
    /// Living units in initiative order.
    order: Vec<UnitId>,
    /// Living units that count towards their team.
    active: Vec<UnitId>,
    cursor: usize,
    /// The unit under the cursor was removed, so the cursor already points
    /// at the next one.
    current_removed: bool,
    round: u32,
}

impl TurnScheduler {
    pub fn new(ordering: InitiativeOrder) -> Self {
        Self {
            ordering,
            ..Self::default()
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn order(&self) -> &[UnitId] {
        &self.order
    }

    pub fn is_started(&self) -> bool {
        self.state != TurnState::RollingInitiative
    }

    pub fn is_over(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn current_unit(&self) -> Option<UnitId> {
        match self.state {
            TurnState::UnitTurn(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<EncounterOutcome> {
        match self.state {
            TurnState::Victory => Some(EncounterOutcome::Victory),
            TurnState::GameOver => Some(EncounterOutcome::GameOver),
            _ => None,
        }
    }

    /// Stable sort of the order by initiative.
    fn sort(&mut self, units: &[Unit]) {
        let initiative = |id: &UnitId| units.get(id.0).map_or(0, |u| u.initiative);
        match self.ordering {
            InitiativeOrder::Ascending => self.order.sort_by_key(initiative),
            InitiativeOrder::Descending => self.order.sort_by_key(|id| Reverse(initiative(id))),
        }
    }

    /// Drop a unit from both lists, keeping the cursor on the same next
    /// unit.
    fn remove(&mut self, unit: UnitId) {
        if let Some(idx) = self.order.iter().position(|&u| u == unit) {
            self.order.remove(idx);
            if idx < self.cursor {
                self.cursor -= 1;
            } else if idx == self.cursor {
                self.current_removed = true;
            }
        }
        self.active.retain(|&u| u != unit);
    }
}

impl Encounter {
    /// Roll initiative and begin the first round.
    pub fn start(&mut self) -> Result<(), CombatError> {
        if self.scheduler.is_started() {
            return Err(CombatError::AlreadyStarted);
        }

        let living: Vec<UnitId> = self.living_units().collect();
        for &unit in &living {
            let agility = self.stat(unit, Stat::Agility)?;
            let roll = self.basic_roll(unit, agility, Reroll::No)?;
            self.unit_mut(unit)?.initiative = roll;
            self.emit(CombatEvent::InitiativeRolled { unit, roll });
        }

        self.scheduler.order = living.clone();
        self.scheduler.active = living;
        self.scheduler.sort(&self.units);
        self.scheduler.state = TurnState::RoundStart;
        info!(order = ?self.scheduler.order, "initiative rolled");

        if let Some(outcome) = self.wiped_team() {
            self.finish(outcome);
            return Ok(());
        }
        self.begin_round()?;
        self.activate_cursor()
    }

    /// Finish a unit's turn and move on to the next one. Does nothing if
    /// the unit is not taking its turn.
    pub fn end_turn(&mut self, unit: UnitId) -> Result<(), CombatError> {
        if !self.unit(unit)?.is_turn_unit {
            return Ok(());
        }
        self.unit_mut(unit)?.is_turn_unit = false;
        debug!(unit = %unit, "turn ended");
        self.emit(CombatEvent::TurnEnded { unit });

        self.clean_end_of_turn(unit)?;
        self.search(unit, Timing::TurnEnd, None)?;
        if self.scheduler.is_over() {
            return Ok(());
        }

        if !self.scheduler.current_removed {
            self.scheduler.cursor += 1;
        }
        self.scheduler.current_removed = false;
        self.activate_cursor()
    }

    /// Take a unit out of the fight.
    pub fn kill_unit(&mut self, unit: UnitId) -> Result<(), CombatError> {
        let (name, was_turn_unit) = {
            let target = self.unit_mut(unit)?;
            if !target.alive {
                return Ok(());
            }
            target.alive = false;
            target.hp = 0;
            let was_turn_unit = target.is_turn_unit;
            target.is_turn_unit = false;
            (target.name.clone(), was_turn_unit)
        };
        self.scheduler.remove(unit);
        info!(unit = %unit, name = %name, "unit killed");
        self.emit(CombatEvent::UnitKilled { unit, name });

        if !self.scheduler.is_started() || self.scheduler.is_over() {
            return Ok(());
        }
        if let Some(outcome) = self.wiped_team() {
            self.finish(outcome);
            return Ok(());
        }
        if was_turn_unit {
            self.emit(CombatEvent::TurnEnded { unit });
            self.scheduler.current_removed = false;
            self.activate_cursor()?;
        }
        Ok(())
    }

    /// Bring a unit into the encounter mid-fight. Summoned units share their
    /// summoner's initiative and act right after it.
    pub fn add_unit(&mut self, mut unit: Unit, summoner: Option<UnitId>) -> Result<UnitId, CombatError> {
        if let Some(summoner) = summoner {
            unit.initiative = self.unit(summoner)?.initiative;
            unit.summoner = Some(summoner);
        }
        let id = self.spawn(unit);
        if !self.scheduler.is_started() || self.scheduler.is_over() {
            return Ok(id);
        }

        if summoner.is_none() {
            let agility = self.stat(id, Stat::Agility)?;
            let roll = self.basic_roll(id, agility, Reroll::No)?;
            self.unit_mut(id)?.initiative = roll;
            self.emit(CombatEvent::InitiativeRolled { unit: id, roll });
        }

        let under_cursor = self.scheduler.order.get(self.scheduler.cursor).copied();
        self.scheduler.order.push(id);
        self.scheduler.active.push(id);
        self.scheduler.sort(&self.units);
        if let Some(current) = under_cursor {
            if let Some(idx) = self.scheduler.order.iter().position(|&u| u == current) {
                self.scheduler.cursor = idx;
            }
        }
        Ok(id)
    }

    pub fn current_unit(&self) -> Option<UnitId> {
        self.scheduler.current_unit()
    }

    pub fn round(&self) -> u32 {
        self.scheduler.round()
    }

    pub fn state(&self) -> TurnState {
        self.scheduler.state()
    }

    /// Snapshot of the initiative order.
    pub fn order(&self) -> Vec<UnitId> {
        self.scheduler.order().to_vec()
    }

    pub fn outcome(&self) -> Option<EncounterOutcome> {
        self.scheduler.outcome()
    }

    pub fn is_over(&self) -> bool {
        self.scheduler.is_over()
    }

    pub fn is_started(&self) -> bool {
        self.scheduler.is_started()
    }

    fn wiped_team(&self) -> Option<EncounterOutcome> {
        let count = |team: Team| {
            self.scheduler
                .active
                .iter()
                .filter(|id| self.units.get(id.0).is_some_and(|u| u.team == team))
                .count()
        };
        if count(Team::Good) == 0 {
            Some(EncounterOutcome::GameOver)
        } else if count(Team::Evil) == 0 {
            Some(EncounterOutcome::Victory)
        } else {
            None
        }
    }

    fn finish(&mut self, outcome: EncounterOutcome) {
        self.scheduler.state = match outcome {
            EncounterOutcome::Victory => TurnState::Victory,
            EncounterOutcome::GameOver => TurnState::GameOver,
        };
        self.scheduler.order.clear();
        self.scheduler.active.clear();
        self.scheduler.cursor = 0;
        self.scheduler.current_removed = false;
        for unit in &mut self.units {
            unit.is_turn_unit = false;
        }
        info!(%outcome, round = self.scheduler.round, "encounter ended");
        self.emit(CombatEvent::EncounterEnded { outcome });
    }

    fn begin_round(&mut self) -> Result<(), CombatError> {
        self.scheduler.round += 1;
        self.scheduler.state = TurnState::RoundStart;
        let round = self.scheduler.round;
        debug!(round, "round started");
        self.emit(CombatEvent::RoundStarted { round });

        let order = self.scheduler.order.clone();
        for &unit in &order {
            let generation = self.stat(unit, Stat::MpGeneration)?;
            self.restore_mana(unit, generation)?;
        }
        for &unit in &order {
            if self.unit(unit)?.is_alive() {
                self.search(unit, Timing::RoundStart, None)?;
            }
        }
        Ok(())
    }

    fn end_round(&mut self) -> Result<(), CombatError> {
        let round = self.scheduler.round;
        self.emit(CombatEvent::RoundEnded { round });
        let order = self.scheduler.order.clone();
        for &unit in &order {
            if self.unit(unit)?.is_alive() {
                self.search(unit, Timing::RoundEnd, None)?;
            }
        }
        Ok(())
    }

    /// Start the turn of the unit under the cursor, skipping units that die
    /// while their turn starts and wrapping into new rounds.
    fn activate_cursor(&mut self) -> Result<(), CombatError> {
        loop {
            if self.scheduler.is_over() || self.scheduler.order.is_empty() {
                return Ok(());
            }
            if self.scheduler.cursor >= self.scheduler.order.len() {
                self.end_round()?;
                if self.scheduler.is_over() {
                    return Ok(());
                }
                self.scheduler.cursor = 0;
                self.begin_round()?;
                continue;
            }

            let unit = self.scheduler.order[self.scheduler.cursor];
            if self.start_turn(unit)? {
                return Ok(());
            }
            if !self.scheduler.current_removed {
                self.scheduler.cursor += 1;
            }
            self.scheduler.current_removed = false;
        }
    }

    /// Returns false when the unit did not survive the start of its turn.
    fn start_turn(&mut self, unit: UnitId) -> Result<bool, CombatError> {
        self.scheduler.current_removed = false;
        self.clean_effects_by_source(unit)?;
        self.clean_start_of_turn(unit)?;
        self.search(unit, Timing::TurnStart, None)?;
        if !self.unit(unit)?.is_alive() || self.scheduler.is_over() {
            return Ok(false);
        }

        let actions = {
            let target = self.unit_mut(unit)?;
            target.is_turn_unit = true;
            target.actions += target.max_actions;
            target.reset_ability_uses();
            target.actions
        };
        self.scheduler.state = TurnState::UnitTurn(unit);
        debug!(unit = %unit, actions, "turn started");
        self.emit(CombatEvent::TurnStarted { unit, actions });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{AbilityEffect, EffectKind};
    use crate::encounter::EncounterConfig;
    use crate::testing::TestHarness;
    use crate::world::Rank;

    /// Spawn units and start with scripted initiative rolls, one 3d6 total
    /// per unit in spawn order (each total split into three faces).
    fn started(units: &[(&str, Team, u32)]) -> (TestHarness, Vec<UnitId>) {
        started_with(TestHarness::new(), units)
    }

    fn started_with(mut harness: TestHarness, units: &[(&str, Team, u32)]) -> (TestHarness, Vec<UnitId>) {
        let ids = units
            .iter()
            .map(|(name, team, _)| harness.spawn_sample(name, *team))
            .collect();
        for (_, _, face) in units {
            harness.dice.queue(&[*face, *face, *face]);
        }
        harness.encounter.start().unwrap();
        (harness, ids)
    }

    #[test]
    fn test_ascending_initiative() {
        let (harness, ids) = started(&[
            ("A", Team::Good, 5),
            ("B", Team::Evil, 2),
            ("C", Team::Good, 4),
        ]);
        assert_eq!(harness.encounter.order(), vec![ids[1], ids[2], ids[0]]);
        assert_eq!(harness.encounter.current_unit(), Some(ids[1]));
        assert_eq!(harness.encounter.round(), 1);
    }

    #[test]
    fn test_descending_initiative() {
        let config = EncounterConfig::new("Test").with_initiative_order(InitiativeOrder::Descending);
        let (harness, ids) = started_with(
            TestHarness::with_config(config),
            &[("A", Team::Good, 5), ("B", Team::Evil, 2), ("C", Team::Good, 4)],
        );
        assert_eq!(harness.encounter.order(), vec![ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn test_ties_keep_spawn_order() {
        let (harness, ids) = started(&[("A", Team::Good, 3), ("B", Team::Evil, 3)]);
        assert_eq!(harness.encounter.order(), ids);
    }

    #[test]
    fn test_start_twice_is_an_error() {
        let (mut harness, _) = started(&[("A", Team::Good, 3), ("B", Team::Evil, 3)]);
        assert!(matches!(
            harness.encounter.start(),
            Err(CombatError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_rounds_wrap_and_generate_mana() {
        let (mut harness, ids) = started(&[("A", Team::Good, 1), ("B", Team::Evil, 2)]);
        harness.encounter.sum_param(ids[0], Stat::Mana, 4).unwrap();

        harness.encounter.end_turn(ids[0]).unwrap();
        assert_eq!(harness.encounter.current_unit(), Some(ids[1]));
        harness.encounter.end_turn(ids[1]).unwrap();

        assert_eq!(harness.encounter.round(), 2);
        assert_eq!(harness.encounter.current_unit(), Some(ids[0]));
        assert_eq!(harness.encounter.unit(ids[0]).unwrap().mp, 4);
        let round_ends = harness
            .encounter
            .events()
            .filter(|e| matches!(e, CombatEvent::RoundEnded { round: 1 }))
            .count();
        assert_eq!(round_ends, 1);
    }

    #[test]
    fn test_actions_are_additive() {
        let (mut harness, ids) = started(&[("A", Team::Good, 1), ("B", Team::Evil, 2)]);
        assert_eq!(harness.encounter.unit(ids[0]).unwrap().actions, 3);
        harness.encounter.reduce_action_count(ids[0], 1).unwrap();
        harness.encounter.end_turn(ids[0]).unwrap();
        harness.encounter.end_turn(ids[1]).unwrap();
        assert_eq!(harness.encounter.unit(ids[0]).unwrap().actions, 5);
    }

    #[test]
    fn test_killing_earlier_unit_keeps_cursor() {
        let (mut harness, ids) = started(&[
            ("A", Team::Good, 1),
            ("B", Team::Evil, 2),
            ("C", Team::Good, 3),
            ("D", Team::Evil, 4),
        ]);
        harness.encounter.end_turn(ids[0]).unwrap();
        assert_eq!(harness.encounter.current_unit(), Some(ids[1]));

        harness.encounter.kill_unit(ids[0]).unwrap();
        assert_eq!(harness.encounter.current_unit(), Some(ids[1]));
        harness.encounter.end_turn(ids[1]).unwrap();
        assert_eq!(harness.encounter.current_unit(), Some(ids[2]));
    }

    #[test]
    fn test_killing_turn_unit_advances() {
        let (mut harness, ids) = started(&[
            ("A", Team::Good, 1),
            ("B", Team::Evil, 2),
            ("C", Team::Good, 3),
            ("D", Team::Evil, 4),
        ]);
        harness.encounter.kill_unit(ids[0]).unwrap();
        assert_eq!(harness.encounter.current_unit(), Some(ids[1]));
        assert_eq!(harness.encounter.order(), vec![ids[1], ids[2], ids[3]]);
        assert_eq!(harness.encounter.round(), 1);
    }

    #[test]
    fn test_wipeout_ends_once() {
        let (mut harness, ids) = started(&[
            ("A", Team::Good, 1),
            ("B", Team::Good, 2),
            ("C", Team::Evil, 3),
        ]);
        harness.encounter.kill_unit(ids[2]).unwrap();
        assert_eq!(harness.encounter.state(), TurnState::Victory);
        assert_eq!(harness.encounter.outcome(), Some(EncounterOutcome::Victory));
        assert_eq!(harness.encounter.current_unit(), None);
        assert!(harness.encounter.order().is_empty());

        harness.encounter.kill_unit(ids[1]).unwrap();
        harness.encounter.end_turn(ids[0]).unwrap();
        let ended = harness
            .encounter
            .events()
            .filter(|e| matches!(e, CombatEvent::EncounterEnded { .. }))
            .count();
        assert_eq!(ended, 1);
        assert_eq!(harness.encounter.state(), TurnState::Victory);
    }

    #[test]
    fn test_kill_before_start_does_not_end() {
        let mut harness = TestHarness::new();
        harness.spawn_sample("A", Team::Good);
        let b = harness.spawn_sample("B", Team::Evil);
        harness.encounter.kill_unit(b).unwrap();
        assert_eq!(harness.encounter.state(), TurnState::RollingInitiative);
    }

    #[test]
    fn test_empty_team_goes_terminal_at_start() {
        let (harness, _) = started(&[("A", Team::Good, 3)]);
        assert_eq!(harness.encounter.outcome(), Some(EncounterOutcome::Victory));
        assert_eq!(harness.encounter.round(), 0);
    }

    #[test]
    fn test_summon_acts_after_summoner() {
        let (mut harness, ids) = started(&[
            ("A", Team::Good, 1),
            ("B", Team::Evil, 2),
            ("C", Team::Good, 3),
        ]);
        let zombie = harness
            .encounter
            .add_unit(crate::spells::zombie(Team::Good), Some(ids[0]))
            .unwrap();
        assert_eq!(harness.encounter.order(), vec![ids[0], zombie, ids[1], ids[2]]);
        assert_eq!(harness.encounter.current_unit(), Some(ids[0]));

        harness.encounter.end_turn(ids[0]).unwrap();
        assert_eq!(harness.encounter.current_unit(), Some(zombie));
        assert_eq!(
            harness.encounter.unit(zombie).unwrap().summoner,
            Some(ids[0])
        );
    }

    #[test]
    fn test_burn_death_skips_turn() {
        let (mut harness, ids) = started(&[
            ("A", Team::Good, 1),
            ("B", Team::Evil, 2),
            ("C", Team::Evil, 3),
        ]);
        harness.encounter.unit_mut(ids[1]).unwrap().hp = 1;
        harness
            .encounter
            .add_effect(ids[1], AbilityEffect::new(EffectKind::Burned, Rank::E), Some(ids[0]), None)
            .unwrap();

        harness.encounter.end_turn(ids[0]).unwrap();
        assert!(!harness.encounter.unit(ids[1]).unwrap().is_alive());
        assert_eq!(harness.encounter.current_unit(), Some(ids[2]));
    }
}

//! Action economy: spending actions and ending turns.

use crate::abilities::ActionType;
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::params::Stat;
use crate::world::UnitId;
use tracing::debug;

impl Encounter {
    /// Spend `count` actions. The unit's turn ends when it runs out while it
    /// is the turn unit; a unit acting out of turn only loses the actions.
    pub fn reduce_action_count(&mut self, unit: UnitId, count: i32) -> Result<(), CombatError> {
        let (remaining, is_turn_unit) = {
            let target = self.unit_mut(unit)?;
            target.actions -= count;
            (target.actions, target.is_turn_unit)
        };
        debug!(unit = %unit, remaining, "actions spent");
        if remaining <= 0 && is_turn_unit {
            self.end_turn(unit)?;
        }
        Ok(())
    }

    /// Use up the whole turn.
    pub fn full_action(&mut self, unit: UnitId) -> Result<(), CombatError> {
        let actions = self.unit(unit)?.actions;
        self.reduce_action_count(unit, actions.max(0))
    }

    pub fn spend_action(&mut self, unit: UnitId, action: ActionType) -> Result<(), CombatError> {
        match action {
            ActionType::Free => Ok(()),
            ActionType::Single => self.reduce_action_count(unit, 1),
            ActionType::Full => self.full_action(unit),
        }
    }

    /// Take a move action. Returns how far the unit may go; pathing is the
    /// caller's business.
    pub fn move_unit(&mut self, unit: UnitId) -> Result<i32, CombatError> {
        self.ensure_not_over()?;
        self.ensure_alive(unit)?;
        let distance = self.movement(unit)?;
        self.reduce_action_count(unit, 1)?;
        Ok(distance)
    }

    pub fn movement(&self, unit: UnitId) -> Result<i32, CombatError> {
        self.stat(unit, Stat::Movement)
    }

    /// Whether the unit still has its whole allowance, as Full actions need.
    pub fn action_usage(&self, unit: UnitId) -> Result<bool, CombatError> {
        let target = self.unit(unit)?;
        Ok(target.actions == target.max_actions)
    }
}

#[cfg(test)]
mod tests {
    use crate::events::CombatEvent;
    use crate::testing::TestHarness;
    use crate::world::Team;

    #[test]
    fn test_full_action_ends_turn() {
        let mut harness = TestHarness::new();
        let a = harness.spawn_sample("A", Team::Good);
        harness.spawn_sample("B", Team::Evil);
        harness.dice.queue(&[1, 1, 1, 6, 6, 6]);
        harness.encounter.start().unwrap();
        assert_eq!(harness.encounter.current_unit(), Some(a));
        assert!(harness.encounter.action_usage(a).unwrap());

        harness.encounter.full_action(a).unwrap();
        assert_ne!(harness.encounter.current_unit(), Some(a));
        let ended = harness
            .encounter
            .events()
            .filter(|e| matches!(e, CombatEvent::TurnEnded { unit } if *unit == a))
            .count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn test_move_returns_movement() {
        let mut harness = TestHarness::new();
        let a = harness.spawn_sample("A", Team::Good);
        harness.encounter.unit_mut(a).unwrap().actions = 3;
        assert_eq!(harness.encounter.move_unit(a).unwrap(), 5);
        assert_eq!(harness.encounter.unit(a).unwrap().actions, 2);
    }
}

//! The encounter: the session object that owns every unit, the turn
//! scheduler, the dice and the event log.
//!
//! All combat operations are methods on [`Encounter`]; the modules that
//! implement them (`actions`, `turn`, `spells`, ...) add `impl Encounter`
//! blocks of their own.

use crate::dice::{self, Dice, GameRng, RandomSource, Reroll};
use crate::effects::{EffectKind, StackPolicy};
use crate::error::CombatError;
use crate::events::{CombatEvent, EventLog};
use crate::params::Stat;
use crate::turn::{InitiativeOrder, TurnScheduler};
use crate::world::{Rank, Unit, UnitId, DEFAULT_MAX_ACTIONS};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Configuration for an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterConfig {
    /// Encounter name, for logs.
    pub name: String,

    /// Dice seed. `None` seeds from entropy.
    pub seed: Option<u64>,

    pub initiative_order: InitiativeOrder,

    /// How duplicate non-stackable effects are resolved.
    pub stack_policy: StackPolicy,

    /// Actions granted at the start of each turn.
    pub max_actions: i32,

    /// Damage dice for a bare-handed attack.
    pub unarmed_dice: Dice,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self::new("Encounter")
    }
}

impl EncounterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: None,
            initiative_order: InitiativeOrder::Ascending,
            stack_policy: StackPolicy::Replace,
            max_actions: DEFAULT_MAX_ACTIONS,
            unarmed_dice: Dice::new(1, 4),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_initiative_order(mut self, order: InitiativeOrder) -> Self {
        self.initiative_order = order;
        self
    }

    pub fn with_stack_policy(mut self, policy: StackPolicy) -> Self {
        self.stack_policy = policy;
        self
    }

    pub fn with_max_actions(mut self, actions: i32) -> Self {
        self.max_actions = actions;
        self
    }

    pub fn with_unarmed_dice(mut self, dice: Dice) -> Self {
        self.unarmed_dice = dice;
        self
    }
}

/// Name, rank and cost of an ability, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityInfo {
    pub name: String,
    pub rank: Rank,
    pub mp_cost: i32,
}

/// A single combat between two teams.
pub struct Encounter {
    pub(crate) units: Vec<Unit>,
    pub(crate) scheduler: TurnScheduler,
    pub(crate) rng: Box<dyn RandomSource>,
    pub(crate) config: EncounterConfig,
    log: EventLog,
}

impl Encounter {
    /// Create an encounter rolling seeded (or entropy-seeded) dice.
    pub fn new(config: EncounterConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => GameRng::new(seed),
            None => GameRng::from_entropy(),
        };
        debug!(name = %config.name, seed = rng.seed(), "encounter created");
        Self::with_random_source(config, Box::new(rng))
    }

    /// Create an encounter drawing dice from `rng`.
    pub fn with_random_source(config: EncounterConfig, rng: Box<dyn RandomSource>) -> Self {
        Self {
            units: Vec::new(),
            scheduler: TurnScheduler::new(config.initiative_order),
            rng,
            config,
            log: EventLog::new(),
        }
    }

    pub fn config(&self) -> &EncounterConfig {
        &self.config
    }

    // ========================================================================
    // Units
    // ========================================================================

    /// Add a unit to the arena. Use [`Encounter::add_unit`] once the
    /// encounter has started so it also joins the turn order.
    pub fn spawn(&mut self, mut unit: Unit) -> UnitId {
        let id = UnitId(self.units.len());
        unit.id = id;
        unit.max_actions = self.config.max_actions;
        self.emit(CombatEvent::UnitJoined {
            unit: id,
            name: unit.name.clone(),
            team: unit.team,
        });
        self.units.push(unit);
        id
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit, CombatError> {
        self.units.get(id.0).ok_or(CombatError::UnknownUnit(id))
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit, CombatError> {
        self.units.get_mut(id.0).ok_or(CombatError::UnknownUnit(id))
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn living_units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.iter().filter(|u| u.alive).map(|u| u.id)
    }

    /// Living units on the other team.
    pub fn hostiles_of(&self, id: UnitId) -> Result<Vec<UnitId>, CombatError> {
        let team = self.unit(id)?.team;
        Ok(self
            .units
            .iter()
            .filter(|u| u.alive && u.team != team)
            .map(|u| u.id)
            .collect())
    }

    /// Living units on the same team, not counting `id` itself.
    pub fn allies_of(&self, id: UnitId) -> Result<Vec<UnitId>, CombatError> {
        let team = self.unit(id)?.team;
        Ok(self
            .units
            .iter()
            .filter(|u| u.alive && u.team == team && u.id != id)
            .map(|u| u.id)
            .collect())
    }

    pub fn ensure_alive(&self, id: UnitId) -> Result<(), CombatError> {
        if self.unit(id)?.is_alive() {
            Ok(())
        } else {
            Err(CombatError::UnitDown(id))
        }
    }

    pub fn ensure_not_over(&self) -> Result<(), CombatError> {
        if self.scheduler.is_over() {
            Err(CombatError::EncounterOver)
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub(crate) fn emit(&mut self, event: CombatEvent) {
        trace!(%event, "event");
        self.log.push(event);
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        self.log.drain()
    }

    /// Events not yet drained.
    pub fn events(&self) -> impl Iterator<Item = &CombatEvent> {
        self.log.iter()
    }

    // ========================================================================
    // Rolls
    // ========================================================================

    /// 3d6 + bonus for a unit. A pending Charisma bonus is added and spent.
    pub fn basic_roll(&mut self, unit: UnitId, bonus: i32, reroll: Reroll) -> Result<i32, CombatError> {
        let bonus = bonus + self.take_charisma(unit)?;
        let roll = dice::basic_roll(self.rng.as_mut(), bonus, reroll);
        trace!(unit = %unit, roll, "basic roll");
        Ok(roll)
    }

    /// NdS + bonus for a unit. An empty pool yields 0 and leaves a pending
    /// Charisma bonus alone.
    pub fn custom_roll(
        &mut self,
        unit: UnitId,
        dice: Dice,
        bonus: i32,
        reroll: Reroll,
    ) -> Result<i32, CombatError> {
        if !dice.is_rollable() {
            return Ok(0);
        }
        let bonus = bonus + self.take_charisma(unit)?;
        let roll = dice::custom_roll(self.rng.as_mut(), dice, bonus, reroll);
        trace!(unit = %unit, %dice, roll, "custom roll");
        Ok(roll)
    }

    /// A roll no unit makes, such as burn damage.
    pub fn roll_raw(&mut self, dice: Dice, bonus: i32, reroll: Reroll) -> i32 {
        dice::custom_roll(self.rng.as_mut(), dice, bonus, reroll)
    }

    fn take_charisma(&mut self, unit: UnitId) -> Result<i32, CombatError> {
        if !self.unit(unit)?.effects.has_charisma() {
            return Ok(0);
        }
        let charisma = self
            .unit(unit)?
            .effects
            .iter()
            .find(|e| e.kind == EffectKind::Charisma)
            .map(|e| (e.id, e.bonus));
        match charisma {
            Some((id, bonus)) => {
                self.remove_effect(unit, id)?;
                debug!(unit = %unit, bonus, "charisma spent");
                Ok(bonus)
            }
            None => {
                self.unit_mut(unit)?.effects.set_charisma(false);
                Ok(0)
            }
        }
    }

    // ========================================================================
    // Health and mana
    // ========================================================================

    /// Deal damage. A unit brought to 0 HP is killed. Returns the new HP.
    pub fn damage_unit(&mut self, unit: UnitId, amount: i32) -> Result<i32, CombatError> {
        let (hp, max_hp) = {
            let target = self.unit_mut(unit)?;
            if !target.alive {
                return Ok(0);
            }
            (target.reduce_health(amount), target.max_hp)
        };
        debug!(unit = %unit, amount, hp, "damage dealt");
        self.emit(CombatEvent::HealthChanged {
            unit,
            amount: -amount.max(0),
            hp,
            max_hp,
        });
        if hp == 0 {
            self.kill_unit(unit)?;
        }
        Ok(hp)
    }

    /// Heal a living unit up to its maximum. Returns the amount restored.
    pub fn heal_unit(&mut self, unit: UnitId, amount: i32) -> Result<i32, CombatError> {
        let (restored, hp, max_hp) = {
            let target = self.unit_mut(unit)?;
            if !target.alive {
                return Ok(0);
            }
            let restored = target.increase_health(amount);
            (restored, target.hp, target.max_hp)
        };
        debug!(unit = %unit, restored, hp, "healed");
        self.emit(CombatEvent::HealthChanged {
            unit,
            amount: restored,
            hp,
            max_hp,
        });
        Ok(restored)
    }

    /// Pay a mana cost, bleeding HP for any shortfall. Returns false, with
    /// nothing changed, when the unit cannot afford it.
    pub fn spend_mana(&mut self, unit: UnitId, cost: i32) -> Result<bool, CombatError> {
        let (paid, mp_delta, hp_delta, mp, hp, max_hp) = {
            let target = self.unit_mut(unit)?;
            let (mp_before, hp_before) = (target.mp, target.hp);
            let paid = target.spend_mana(cost);
            (
                paid,
                target.mp - mp_before,
                target.hp - hp_before,
                target.mp,
                target.hp,
                target.max_hp,
            )
        };
        if !paid {
            debug!(unit = %unit, cost, "mana refused");
            return Ok(false);
        }
        if mp_delta != 0 {
            self.emit(CombatEvent::ManaChanged {
                unit,
                amount: mp_delta,
                mp,
            });
        }
        if hp_delta != 0 {
            debug!(unit = %unit, shortfall = -hp_delta, "mana paid in blood");
            self.emit(CombatEvent::HealthChanged {
                unit,
                amount: hp_delta,
                hp,
                max_hp,
            });
        }
        Ok(true)
    }

    /// Gain MP up to the cap.
    pub fn restore_mana(&mut self, unit: UnitId, amount: i32) -> Result<(), CombatError> {
        let (delta, mp) = {
            let target = self.unit_mut(unit)?;
            let before = target.mp;
            target.increase_mp(amount);
            (target.mp - before, target.mp)
        };
        if delta != 0 {
            self.emit(CombatEvent::ManaChanged {
                unit,
                amount: delta,
                mp,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    pub fn stat(&self, unit: UnitId, stat: Stat) -> Result<i32, CombatError> {
        Ok(self.unit(unit)?.stat(stat))
    }

    pub fn sum_param(&mut self, unit: UnitId, stat: Stat, delta: i32) -> Result<(), CombatError> {
        self.unit_mut(unit)?.params.sum(stat, delta);
        self.flush_params(unit)
    }

    pub fn subtract_param(&mut self, unit: UnitId, stat: Stat, delta: i32) -> Result<(), CombatError> {
        self.unit_mut(unit)?.params.subtract(stat, delta);
        self.flush_params(unit)
    }

    /// Turn recorded parameter changes into events.
    fn flush_params(&mut self, unit: UnitId) -> Result<(), CombatError> {
        let changes = self.unit_mut(unit)?.params.drain_changes();
        for change in changes {
            self.emit(CombatEvent::ParameterChanged {
                unit,
                stat: change.stat,
                old: change.old,
                new: change.new,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Display text for a stat, e.g. `"Movement: 8 (STR + 5)"`.
    pub fn param_text(&self, unit: UnitId, stat: Stat) -> Result<String, CombatError> {
        Ok(self.unit(unit)?.params.text(stat))
    }

    pub fn hp(&self, unit: UnitId) -> Result<i32, CombatError> {
        Ok(self.unit(unit)?.hp)
    }

    pub fn mp(&self, unit: UnitId) -> Result<i32, CombatError> {
        Ok(self.unit(unit)?.mp)
    }

    pub fn ability_names(&self, unit: UnitId) -> Result<Vec<String>, CombatError> {
        Ok(self.unit(unit)?.abilities.iter().map(|a| a.name()).collect())
    }

    pub fn ability_info(&self, unit: UnitId) -> Result<Vec<AbilityInfo>, CombatError> {
        Ok(self
            .unit(unit)?
            .abilities
            .iter()
            .map(|a| AbilityInfo {
                name: a.name(),
                rank: a.rank,
                mp_cost: a.mp_cost(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::{Ability, SkillKind};
    use crate::effects::AbilityEffect;
    use crate::testing::TestHarness;
    use crate::world::Team;

    #[test]
    fn test_config_builder() {
        let config = EncounterConfig::new("Siege")
            .with_seed(9)
            .with_max_actions(2)
            .with_stack_policy(StackPolicy::RejectNew);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.max_actions, 2);
        assert_eq!(config.unarmed_dice, Dice::new(1, 4));

        let parsed: EncounterConfig =
            serde_json::from_str(r#"{"name": "Ambush", "initiative_order": "Descending"}"#).unwrap();
        assert_eq!(parsed.initiative_order, InitiativeOrder::Descending);
        assert_eq!(parsed.max_actions, DEFAULT_MAX_ACTIONS);
    }

    #[test]
    fn test_unknown_unit() {
        let harness = TestHarness::new();
        assert!(matches!(
            harness.encounter.unit(UnitId(7)),
            Err(CombatError::UnknownUnit(UnitId(7)))
        ));
    }

    #[test]
    fn test_charisma_spent_on_next_roll() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        harness
            .encounter
            .add_effect(hero, AbilityEffect::new(EffectKind::Charisma, Rank::B), None, None)
            .unwrap();

        // An empty pool leaves the bonus pending.
        assert_eq!(
            harness
                .encounter
                .custom_roll(hero, Dice::NONE, 2, Reroll::No)
                .unwrap(),
            0
        );
        assert!(harness.encounter.unit(hero).unwrap().effects.has_charisma());

        harness.dice.queue(&[1, 1, 1, 1, 1, 1]);
        assert_eq!(harness.encounter.basic_roll(hero, 0, Reroll::No).unwrap(), 7);
        assert_eq!(harness.encounter.basic_roll(hero, 0, Reroll::No).unwrap(), 3);
        let unit = harness.encounter.unit(hero).unwrap();
        assert!(!unit.effects.has_charisma());
        assert!(unit.effects.is_empty());
    }

    #[test]
    fn test_lethal_damage_kills() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        assert_eq!(harness.encounter.damage_unit(hero, 10).unwrap(), 15);
        assert_eq!(harness.encounter.damage_unit(hero, 40).unwrap(), 0);
        assert!(!harness.encounter.unit(hero).unwrap().is_alive());
        assert_eq!(harness.encounter.heal_unit(hero, 5).unwrap(), 0);
        assert!(matches!(
            harness.encounter.ensure_alive(hero),
            Err(CombatError::UnitDown(_))
        ));
    }

    #[test]
    fn test_mana_events() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        harness.encounter.restore_mana(hero, 3).unwrap();
        harness.encounter.drain_events();

        assert!(harness.encounter.spend_mana(hero, 5).unwrap());
        let events = harness.encounter.drain_events();
        assert_eq!(
            events,
            vec![
                CombatEvent::ManaChanged {
                    unit: hero,
                    amount: -3,
                    mp: 0
                },
                CombatEvent::HealthChanged {
                    unit: hero,
                    amount: -2,
                    hp: 23,
                    max_hp: 25
                },
            ]
        );
    }

    #[test]
    fn test_param_changes_become_events() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        harness.encounter.drain_events();
        harness.encounter.sum_param(hero, Stat::Strength, 3).unwrap();

        let events = harness.encounter.drain_events();
        assert!(events.contains(&CombatEvent::ParameterChanged {
            unit: hero,
            stat: Stat::Movement,
            old: 5,
            new: 8
        }));
        assert_eq!(
            harness.encounter.param_text(hero, Stat::Movement).unwrap(),
            "Movement: 8 (STR + 5)"
        );
    }

    #[test]
    fn test_ability_info() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        harness.encounter.unit_mut(hero).unwrap().abilities = vec![
            Ability::new(SkillKind::Instinct, Rank::C),
            Ability::new(SkillKind::Charisma, Rank::EX),
        ];
        let info = harness.encounter.ability_info(hero).unwrap();
        assert_eq!(info[0].name, "Instinct");
        assert_eq!(info[0].mp_cost, 6);
        assert_eq!(info[1].rank, Rank::EX);
        assert_eq!(
            harness.encounter.ability_names(hero).unwrap(),
            vec!["Instinct".to_string(), "Charisma".to_string()]
        );
    }
}

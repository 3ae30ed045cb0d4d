//! Noble phantasms: a unit's signature ultimate.
//!
//! Every noble phantasm shares one pipeline: on-attack hooks, a saving
//! throw against the phantasm's DC, a damage roll, then damage halved by a
//! cleared save and reduced by armour. What differs per phantasm is the
//! dice, the DC and which target tags tilt the rolls.

use super::{hook, reduced_damage, AbilityInstance, InstanceKind};
use crate::abilities::ActionType;
use crate::dice::{Dice, Reroll};
use crate::effects::Timing;
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::CombatEvent;
use crate::params::Stat;
use crate::world::{Rank, UnitId};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info};

pub const TAG_PENDRAGON: &str = "Pendragon";
pub const TAG_KING: &str = "King";
pub const TAG_DIVINE: &str = "Divine";
pub const TAG_RIDER: &str = "Rider";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum NoblePhantasmKind {
    #[strum(to_string = "Clarent Blood Arthur")]
    ClarentBloodArthur,
    #[strum(to_string = "Three Thousand Worlds")]
    ThreeThousandWorlds,
}

/// A noble phantasm as carried by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoblePhantasm {
    pub kind: NoblePhantasmKind,
    pub rank: Rank,
    #[serde(default)]
    pub ignores_armour: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NoblePhantasm {
    pub fn new(kind: NoblePhantasmKind, rank: Rank) -> Self {
        Self {
            kind,
            rank,
            ignores_armour: false,
            tags: Vec::new(),
        }
    }

    pub fn clarent_blood_arthur(rank: Rank) -> Self {
        Self::new(NoblePhantasmKind::ClarentBloodArthur, rank)
    }

    pub fn three_thousand_worlds(rank: Rank) -> Self {
        Self::new(NoblePhantasmKind::ThreeThousandWorlds, rank)
    }

    pub fn name(&self) -> String {
        self.kind.to_string()
    }

    pub fn dice(&self) -> Dice {
        let sides = match self.kind {
            NoblePhantasmKind::ClarentBloodArthur => 10,
            NoblePhantasmKind::ThreeThousandWorlds => 8,
        };
        let count = self.rank.pick(&[5, 6, 7, 8, 9, 10], 0);
        Dice::new(count, sides)
    }

    pub fn dc(&self) -> i32 {
        self.rank.pick(&[20, 21, 22, 23, 24, 25], 0)
    }

    pub fn mp_cost(&self) -> i32 {
        self.rank.pick(&[50, 60, 70, 80, 90, 100], 0)
    }

    /// Save and damage rerolls this phantasm imposes on a target.
    fn tag_rerolls(&self, target_tags: &[String]) -> (Reroll, Reroll) {
        let has = |tag: &str| target_tags.iter().any(|t| t == tag);
        match self.kind {
            NoblePhantasmKind::ClarentBloodArthur => {
                let save = if has(TAG_PENDRAGON) {
                    Reroll::Disadvantage
                } else {
                    Reroll::No
                };
                let damage = if has(TAG_KING) {
                    Reroll::Advantage
                } else {
                    Reroll::No
                };
                (save, damage)
            }
            NoblePhantasmKind::ThreeThousandWorlds => {
                let damage = if has(TAG_DIVINE) || has(TAG_RIDER) {
                    Reroll::Advantage
                } else {
                    Reroll::No
                };
                (Reroll::No, damage)
            }
        }
    }
}

/// Result of one noble phantasm instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhantasmOutcome {
    pub target: UnitId,
    pub save_roll: i32,
    pub save_cleared: bool,
    pub damage: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NoblePhantasmInstance {
    pub source: UnitId,
    pub target: UnitId,
    pub phantasm: NoblePhantasm,
    target_tags: Vec<String>,
    pub damage_dealing: bool,
    pub dc_cleared: bool,
    pub damage: i32,
    pub bonus_armour: i32,
    pub bonus_save: i32,
    pub save_advantage: Reroll,
    pub damage_advantage: Reroll,
    pub heal_advantage: Reroll,
}

impl NoblePhantasmInstance {
    pub fn new(
        enc: &Encounter,
        source: UnitId,
        target: UnitId,
        phantasm: NoblePhantasm,
    ) -> Result<Self, CombatError> {
        enc.unit(source)?;
        let target_tags = enc.unit(target)?.tags.clone();
        Ok(Self {
            source,
            target,
            phantasm,
            target_tags,
            damage_dealing: true,
            dc_cleared: false,
            damage: 0,
            bonus_armour: 0,
            bonus_save: 0,
            save_advantage: Reroll::No,
            damage_advantage: Reroll::No,
            heal_advantage: Reroll::No,
        })
    }

    pub fn resolve(&mut self, enc: &mut Encounter) -> Result<PhantasmOutcome, CombatError> {
        enc.search(self.source, Timing::OnAttackSource, hook(self))?;
        enc.search(self.target, Timing::OnAttackTarget, hook(self))?;

        let (save_reroll, damage_reroll) = self.phantasm.tag_rerolls(&self.target_tags);
        self.save_advantage = self.save_advantage.combine(save_reroll);
        self.damage_advantage = self.damage_advantage.combine(damage_reroll);

        let agility = enc.stat(self.target, Stat::Agility)?;
        let save_roll = enc.basic_roll(self.target, agility + self.bonus_save, self.save_advantage)?;
        self.dc_cleared = save_roll > self.phantasm.dc();
        self.damage = enc.custom_roll(
            self.source,
            self.phantasm.dice(),
            0,
            self.damage_advantage,
        )?;

        let mut dealt = None;
        if self.damage_dealing {
            let mut damage = self.damage;
            if self.dc_cleared {
                damage /= 2;
            }
            let armour = if self.phantasm.ignores_armour {
                0
            } else {
                enc.stat(self.target, Stat::Armour)? + self.bonus_armour
            };
            dealt = reduced_damage(damage, armour);
            debug!(
                phantasm = %self.phantasm.kind,
                target = %self.target,
                save_roll,
                cleared = self.dc_cleared,
                damage,
                armour,
                "noble phantasm resolved"
            );
            if let Some(amount) = dealt {
                enc.damage_unit(self.target, amount)?;
            }
        }

        enc.emit(CombatEvent::NoblePhantasmResolved {
            source: self.source,
            target: self.target,
            name: self.phantasm.name(),
            save_cleared: self.dc_cleared,
            damage: dealt,
        });
        Ok(PhantasmOutcome {
            target: self.target,
            save_roll,
            save_cleared: self.dc_cleared,
            damage: dealt,
        })
    }
}

impl AbilityInstance for NoblePhantasmInstance {
    fn kind(&self) -> InstanceKind {
        InstanceKind::NoblePhantasm
    }

    fn source(&self) -> UnitId {
        self.source
    }

    fn target(&self) -> UnitId {
        self.target
    }

    fn rank(&self) -> Rank {
        self.phantasm.rank
    }

    fn weapon_tags(&self) -> &[String] {
        &self.phantasm.tags
    }

    fn target_tags(&self) -> &[String] {
        &self.target_tags
    }

    fn heal_advantage(&self) -> Reroll {
        self.heal_advantage
    }

    fn add_armour_bonus(&mut self, amount: i32) {
        self.bonus_armour += amount;
    }

    fn add_save_bonus(&mut self, amount: i32) {
        self.bonus_save += amount;
    }

    fn change_damage_advantage(&mut self, reroll: Reroll) {
        self.damage_advantage = self.damage_advantage.combine(reroll);
    }

    fn change_heal_advantage(&mut self, reroll: Reroll) {
        self.heal_advantage = self.heal_advantage.combine(reroll);
    }

    fn change_save_advantage(&mut self, reroll: Reroll) {
        self.save_advantage = self.save_advantage.combine(reroll);
    }
}

/// What activating a noble phantasm did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhantasmActivation {
    /// The user could not pay the cost. Nothing else happened.
    Refused { cost: i32 },
    Released(Vec<PhantasmOutcome>),
}

impl Encounter {
    /// Release a unit's noble phantasm on every supplied target, then spend
    /// a full action.
    pub fn noble_phantasm(
        &mut self,
        user: UnitId,
        targets: &[UnitId],
    ) -> Result<PhantasmActivation, CombatError> {
        self.ensure_not_over()?;
        self.ensure_alive(user)?;
        let phantasm = self
            .unit(user)?
            .noble_phantasm
            .clone()
            .ok_or(CombatError::NoNoblePhantasm(user))?;
        if targets.is_empty() {
            return Err(CombatError::TargetRequired(phantasm.name()));
        }

        let cost = phantasm.mp_cost();
        if !self.spend_mana(user, cost)? {
            info!(unit = %user, phantasm = %phantasm.kind, cost, "noble phantasm refused");
            self.emit(CombatEvent::CastRefused {
                unit: user,
                name: phantasm.name(),
                cost,
            });
            return Ok(PhantasmActivation::Refused { cost });
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        for &target in targets {
            if !self.unit(target)?.is_alive() {
                continue;
            }
            let mut instance = NoblePhantasmInstance::new(self, user, target, phantasm.clone())?;
            outcomes.push(instance.resolve(self)?);
        }

        self.spend_action(user, ActionType::Full)?;
        Ok(PhantasmActivation::Released(outcomes))
    }

    /// Phantasms are released, never held, so none can be deactivated.
    pub fn deactivate_noble_phantasm(&mut self, user: UnitId) -> Result<(), CombatError> {
        let phantasm = self
            .unit(user)?
            .noble_phantasm
            .as_ref()
            .ok_or(CombatError::NoNoblePhantasm(user))?;
        unimplemented!("{} cannot be deactivated", phantasm.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Team;

    #[test]
    fn test_rank_tables() {
        let np = NoblePhantasm::clarent_blood_arthur(Rank::E);
        assert_eq!(np.dice(), Dice::new(5, 10));
        assert_eq!(np.dc(), 20);
        assert_eq!(np.mp_cost(), 50);
        assert_eq!(np.name(), "Clarent Blood Arthur");

        let np = NoblePhantasm::three_thousand_worlds(Rank::EX);
        assert_eq!(np.dice(), Dice::new(10, 8));
        assert_eq!(np.dc(), 25);
        assert_eq!(np.mp_cost(), 100);
    }

    #[test]
    fn test_tag_rerolls() {
        let clarent = NoblePhantasm::clarent_blood_arthur(Rank::A);
        let tags = vec![TAG_PENDRAGON.to_string(), TAG_KING.to_string()];
        assert_eq!(
            clarent.tag_rerolls(&tags),
            (Reroll::Disadvantage, Reroll::Advantage)
        );

        let worlds = NoblePhantasm::three_thousand_worlds(Rank::A);
        assert_eq!(
            worlds.tag_rerolls(&[TAG_RIDER.to_string()]),
            (Reroll::No, Reroll::Advantage)
        );
        assert_eq!(worlds.tag_rerolls(&tags), (Reroll::No, Reroll::No));
    }

    #[test]
    fn test_cleared_save_halves_damage() {
        let mut harness = crate::testing::TestHarness::new();
        let user = harness.spawn_sample("Mordred", Team::Good);
        let target = harness.spawn_sample("Target", Team::Evil);
        harness.encounter.unit_mut(user).unwrap().noble_phantasm =
            Some(NoblePhantasm::clarent_blood_arthur(Rank::E));
        harness.encounter.unit_mut(user).unwrap().mp = 50;

        // Save 6 + 6 + 6 = 18, under DC 20. Damage 5d10 all 4s = 20.
        harness.dice.queue(&[6, 6, 6, 4, 4, 4, 4, 4]);
        let activation = harness.encounter.noble_phantasm(user, &[target]).unwrap();
        let PhantasmActivation::Released(outcomes) = activation else {
            panic!("expected release");
        };
        assert!(!outcomes[0].save_cleared);
        assert_eq!(outcomes[0].damage, Some(20));
        assert_eq!(harness.encounter.unit(target).unwrap().hp, 5);
        assert_eq!(harness.encounter.unit(user).unwrap().mp, 0);
    }

    #[test]
    fn test_refusal_spends_nothing() {
        let mut harness = crate::testing::TestHarness::new();
        let user = harness.spawn_sample("Mordred", Team::Good);
        let target = harness.spawn_sample("Target", Team::Evil);
        {
            let unit = harness.encounter.unit_mut(user).unwrap();
            unit.noble_phantasm = Some(NoblePhantasm::clarent_blood_arthur(Rank::E));
            unit.actions = 3;
        }

        let activation = harness.encounter.noble_phantasm(user, &[target]).unwrap();
        assert_eq!(activation, PhantasmActivation::Refused { cost: 50 });
        let unit = harness.encounter.unit(user).unwrap();
        assert_eq!(unit.hp, 25);
        assert_eq!(unit.actions, 3);
        assert_eq!(harness.encounter.unit(target).unwrap().hp, 25);
    }

    #[test]
    fn test_missing_phantasm_is_an_error() {
        let mut harness = crate::testing::TestHarness::new();
        let user = harness.spawn_sample("Nobody", Team::Good);
        let target = harness.spawn_sample("Target", Team::Evil);
        assert!(matches!(
            harness.encounter.noble_phantasm(user, &[target]),
            Err(CombatError::NoNoblePhantasm(_))
        ));
    }

    #[test]
    #[should_panic(expected = "cannot be deactivated")]
    fn test_three_thousand_worlds_deactivation_is_unimplemented() {
        let mut harness = crate::testing::TestHarness::new();
        let nobunaga = harness.spawn_sample("Nobunaga", Team::Evil);
        harness.encounter.unit_mut(nobunaga).unwrap().noble_phantasm =
            Some(NoblePhantasm::three_thousand_worlds(Rank::A));
        let _ = harness.encounter.deactivate_noble_phantasm(nobunaga);
    }

    #[test]
    fn test_deactivating_missing_phantasm_is_an_error() {
        let mut harness = crate::testing::TestHarness::new();
        let user = harness.spawn_sample("Nobody", Team::Good);
        assert!(matches!(
            harness.encounter.deactivate_noble_phantasm(user),
            Err(CombatError::NoNoblePhantasm(_))
        ));
    }
}

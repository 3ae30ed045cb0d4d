//! Spells and casting.

use crate::dice::Dice;
use crate::effects::{AbilityEffect, EffectKind};
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::CombatEvent;
use crate::instance::spell::{SpellInstance, SpellOutcome};
use crate::world::{Element, Rank, TargetType, Team, Unit, UnitClass, UnitId};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info};

pub const TAG_ZOMBIE: &str = "Zombie";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SpellKind {
    #[strum(to_string = "Elemental Burst")]
    ElementalBurst,
    #[strum(to_string = "Elemental Bolt")]
    ElementalBolt,
    Heal,
    #[strum(to_string = "Summon Zombies")]
    SummonZombies,
}

/// A castable spell at a rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub kind: SpellKind,
    pub name: String,
    pub rank: Rank,
    #[serde(default)]
    pub element: Element,
    pub target_type: TargetType,
    /// Whether the spell rolls to hit against evasion.
    pub hit_roll: bool,
    pub damage_dealing: bool,
    #[serde(default)]
    pub area: bool,
    #[serde(default)]
    pub range: i32,
    #[serde(default)]
    pub aoe: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub effect: Option<AbilityEffect>,
}

impl Spell {
    fn base(kind: SpellKind, rank: Rank, target_type: TargetType) -> Self {
        Self {
            kind,
            name: kind.to_string(),
            rank,
            element: Element::Basic,
            target_type,
            hit_roll: false,
            damage_dealing: false,
            area: false,
            range: 0,
            aoe: 0,
            tags: Vec::new(),
            effect: None,
        }
    }

    /// Area blast with no hit roll. A fire burst sets its targets alight.
    pub fn elemental_burst(rank: Rank, element: Element) -> Self {
        let mut spell = Self::base(SpellKind::ElementalBurst, rank, TargetType::Hostile);
        spell.element = element;
        spell.damage_dealing = true;
        spell.area = true;
        spell.range = 10;
        spell.aoe = 3;
        if element == Element::Fire {
            spell.effect = Some(AbilityEffect::new(EffectKind::Burned, rank));
        }
        spell
    }

    pub fn elemental_bolt(rank: Rank, element: Element) -> Self {
        let mut spell = Self::base(SpellKind::ElementalBolt, rank, TargetType::Hostile);
        spell.element = element;
        spell.hit_roll = true;
        spell.damage_dealing = true;
        spell
    }

    pub fn heal(rank: Rank) -> Self {
        Self::base(SpellKind::Heal, rank, TargetType::Friendly)
            .with_effect(AbilityEffect::new(EffectKind::Healing, rank))
    }

    pub fn summon_zombies(rank: Rank) -> Self {
        Self::base(SpellKind::SummonZombies, rank, TargetType::Myself)
    }

    pub fn with_effect(mut self, effect: AbilityEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn mp_cost(&self) -> i32 {
        match self.kind {
            SpellKind::ElementalBurst => self.rank.pick(&[2, 4, 6, 8, 10, 10], 0),
            SpellKind::ElementalBolt | SpellKind::Heal | SpellKind::SummonZombies => {
                self.rank.pick(&[1, 2, 3, 4, 5, 5], 0)
            }
        }
    }

    pub fn dice(&self) -> Dice {
        match self.kind {
            SpellKind::ElementalBurst => self.rank.pick(
                &[
                    Dice::new(1, 8),
                    Dice::new(1, 10),
                    Dice::new(2, 6),
                    Dice::new(2, 8),
                    Dice::new(3, 6),
                    Dice::new(3, 8),
                ],
                Dice::NONE,
            ),
            SpellKind::ElementalBolt => self.rank.pick(
                &[
                    Dice::new(1, 4),
                    Dice::new(1, 6),
                    Dice::new(1, 8),
                    Dice::new(1, 10),
                    Dice::new(2, 6),
                    Dice::new(2, 8),
                ],
                Dice::NONE,
            ),
            SpellKind::Heal | SpellKind::SummonZombies => Dice::NONE,
        }
    }

    /// Number of minions a summoning spell raises.
    pub fn minions(&self) -> usize {
        match self.kind {
            SpellKind::SummonZombies => self.rank.pick(&[1, 2, 3, 4, 5, 6], 0),
            _ => 0,
        }
    }

    pub fn is_summon(&self) -> bool {
        self.minions() > 0
    }
}

/// A one-hit-point zombie raised by Summon Zombies.
pub fn zombie(team: Team) -> Unit {
    Unit::new("Zombie", team, UnitClass::Minion).with_tags([TAG_ZOMBIE])
}

/// What a cast did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastOutcome {
    /// No spell at that index.
    Skipped,
    /// The caster could not pay. No action was spent.
    Refused { cost: i32 },
    Cast(Vec<SpellOutcome>),
    Summoned(Vec<UnitId>),
}

impl Encounter {
    /// Cast the spell at `index` in the caster's list.
    pub fn cast_spell(
        &mut self,
        caster: UnitId,
        index: usize,
        targets: &[UnitId],
    ) -> Result<CastOutcome, CombatError> {
        self.ensure_not_over()?;
        self.ensure_alive(caster)?;
        let Some(spell) = self.unit(caster)?.spells.get(index).cloned() else {
            debug!(unit = %caster, index, "no spell at index");
            return Ok(CastOutcome::Skipped);
        };
        if !spell.is_summon() && targets.is_empty() {
            return Err(CombatError::TargetRequired(spell.name));
        }

        let cost = spell.mp_cost();
        if !self.spend_mana(caster, cost)? {
            info!(unit = %caster, spell = %spell.name, cost, "cast refused");
            self.emit(CombatEvent::CastRefused {
                unit: caster,
                name: spell.name,
                cost,
            });
            return Ok(CastOutcome::Refused { cost });
        }

        let outcome = if spell.is_summon() {
            let team = self.unit(caster)?.team;
            let mut summoned = Vec::with_capacity(spell.minions());
            for _ in 0..spell.minions() {
                summoned.push(self.add_unit(zombie(team), Some(caster))?);
            }
            CastOutcome::Summoned(summoned)
        } else {
            let targets = if spell.area { targets } else { &targets[..1] };
            let mut outcomes = Vec::with_capacity(targets.len());
            for &target in targets {
                if !self.unit(target)?.is_alive() {
                    continue;
                }
                let mut instance = SpellInstance::new(self, caster, target, spell.clone())?;
                outcomes.push(instance.resolve(self)?);
            }
            CastOutcome::Cast(outcomes)
        };

        self.reduce_action_count(caster, 1)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Stat;
    use crate::testing::TestHarness;

    #[test]
    fn test_tables() {
        let burst = Spell::elemental_burst(Rank::C, Element::Water);
        assert_eq!(burst.mp_cost(), 6);
        assert_eq!(burst.dice(), Dice::new(2, 6));
        assert!(burst.effect.is_none());
        let fire = Spell::elemental_burst(Rank::C, Element::Fire);
        let burned = fire.effect.as_ref().unwrap();
        assert_eq!(burned.kind, EffectKind::Burned);
        assert_eq!(burned.dc, 13);
        assert!(!burst.hit_roll);

        let bolt = Spell::elemental_bolt(Rank::EX, Element::Air);
        assert_eq!(bolt.mp_cost(), 5);
        assert_eq!(bolt.dice(), Dice::new(2, 8));

        assert_eq!(Spell::summon_zombies(Rank::EX).minions(), 6);
        assert_eq!(Spell::heal(Rank::B).mp_cost(), 4);
        assert!(Spell::elemental_burst(Rank::E, Element::Fire).effect.is_some());
    }

    #[test]
    fn test_bolt_hits_and_adds_mana() {
        let mut harness = TestHarness::new();
        let mage = harness.spawn_sample("Mage", Team::Good);
        let target = harness.spawn_sample("Target", Team::Evil);
        {
            let unit = harness.encounter.unit_mut(mage).unwrap();
            unit.spells = vec![Spell::elemental_bolt(Rank::C, Element::Air)];
            unit.mp = 5;
        }
        harness.encounter.sum_param(mage, Stat::Mana, 2).unwrap();

        // Hit 4 + 4 + 4 = 12 beats 10, then 1d8 rolls 5 (+2 MAN).
        harness.dice.queue(&[4, 4, 4, 5]);
        let outcome = harness.encounter.cast_spell(mage, 0, &[target]).unwrap();
        let CastOutcome::Cast(results) = outcome else {
            panic!("expected a cast");
        };
        assert!(results[0].hit);
        assert_eq!(results[0].damage, Some(7));
        assert_eq!(harness.encounter.unit(target).unwrap().hp, 18);
        assert_eq!(harness.encounter.unit(mage).unwrap().mp, 2);
    }

    #[test]
    fn test_refused_cast_spends_no_action() {
        let mut harness = TestHarness::new();
        let mage = harness.spawn_sample("Mage", Team::Good);
        let target = harness.spawn_sample("Target", Team::Evil);
        {
            let unit = harness.encounter.unit_mut(mage).unwrap();
            unit.spells = vec![Spell::elemental_burst(Rank::A, Element::Earth)];
            unit.hp = 3;
            unit.actions = 2;
        }

        let outcome = harness.encounter.cast_spell(mage, 0, &[target]).unwrap();
        assert_eq!(outcome, CastOutcome::Refused { cost: 10 });
        let unit = harness.encounter.unit(mage).unwrap();
        assert_eq!(unit.actions, 2);
        assert_eq!(unit.hp, 3);
    }

    #[test]
    fn test_targetless_cast_is_an_error() {
        let mut harness = TestHarness::new();
        let mage = harness.spawn_sample("Mage", Team::Good);
        harness.encounter.unit_mut(mage).unwrap().spells =
            vec![Spell::elemental_bolt(Rank::E, Element::Basic)];
        assert!(matches!(
            harness.encounter.cast_spell(mage, 0, &[]),
            Err(CombatError::TargetRequired(_))
        ));
        assert_eq!(
            harness.encounter.cast_spell(mage, 3, &[]).unwrap(),
            CastOutcome::Skipped
        );
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut harness = TestHarness::new();
        let cleric = harness.spawn_sample("Cleric", Team::Good);
        let ally = harness.spawn_sample("Ally", Team::Good);
        harness.encounter.unit_mut(cleric).unwrap().spells = vec![Spell::heal(Rank::EX)];
        harness.encounter.unit_mut(cleric).unwrap().mp = 5;
        harness.encounter.unit_mut(ally).unwrap().hp = 20;

        // 2d6 rolls 6 + 6.
        harness.dice.queue(&[6, 6]);
        harness.encounter.cast_spell(cleric, 0, &[ally]).unwrap();
        assert_eq!(harness.encounter.unit(ally).unwrap().hp, 25);
    }
}

//! Concrete effect kinds and their hooks.

use super::{AbilityEffect, Duration, EffectClass, Timing};
use crate::dice::{Dice, RandomSource, Reroll};
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::instance::effect::EffectInstance;
use crate::instance::{AbilityInstance, InstanceKind};
use crate::params::Stat;
use crate::world::{Element, Rank, UnitId, TAG_FIRE};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rank-derived numbers for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankValues {
    pub bonus: i32,
    pub dc: i32,
    pub dice: Dice,
}

impl RankValues {
    fn bonus(rank: Rank) -> Self {
        Self {
            bonus: rank.bonus(),
            dc: 0,
            dice: Dice::NONE,
        }
    }

    fn dc(rank: Rank, table: &[i32; 6]) -> Self {
        Self {
            bonus: 0,
            dc: rank.pick(table, 0),
            dice: Dice::NONE,
        }
    }
}

const HEALING_DICE: [Dice; 6] = [
    Dice::new(1, 4),
    Dice::new(1, 6),
    Dice::new(1, 8),
    Dice::new(1, 10),
    Dice::new(1, 12),
    Dice::new(2, 6),
];

/// What an effect does. Each kind hooks a fixed set of timings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// The next roll the unit makes gets the bonus, then the status ends.
    Charisma,
    /// +bonus Crit Threat and Evasion.
    Instinct,
    /// +bonus Strength.
    ManaBurst,
    /// +damage when hitting, +armour against fire.
    ManaBurstFlame,
    /// +bonus Armour.
    Shapeshift,
    /// The stalker's attacks and spells treat the target's evasion as lower.
    Stalking,
    /// Damage at the start of each turn.
    Burned,
    /// +MP Generation and harder hits.
    MadEnhancement,
    /// Attack advantage against targets carrying any of the tags.
    PreferredEnemy { prey_tags: Vec<String> },
    /// Attacks that deal damage inflict Cursed Barbs.
    GaeBolgCurse,
    /// Healing effects landing on the unit roll at disadvantage.
    CursedBarbs,
    /// Spells below this rank are voided.
    MagicResistance,
    /// Heals the target when equipped.
    Healing,
    /// Flat stat change for as long as the effect is filed.
    StatModifier { stat: Stat, amount: i32 },
}

impl EffectKind {
    pub fn default_name(&self) -> &'static str {
        match self {
            EffectKind::Charisma => "Charisma",
            EffectKind::Instinct => "Instinct",
            EffectKind::ManaBurst => "Mana Burst",
            EffectKind::ManaBurstFlame => "Mana Burst (Flame)",
            EffectKind::Shapeshift => "Shapeshift",
            EffectKind::Stalking => "Stalking",
            EffectKind::Burned => "Burned",
            EffectKind::MadEnhancement => "Mad Enhancement",
            EffectKind::PreferredEnemy { .. } => "Preferred Enemy",
            EffectKind::GaeBolgCurse => "Gae Bolg Curse",
            EffectKind::CursedBarbs => "Cursed Barbs",
            EffectKind::MagicResistance => "Magic Resistance",
            EffectKind::Healing => "Healing",
            EffectKind::StatModifier { .. } => "Stat Modifier",
        }
    }

    pub fn classification(&self) -> (EffectClass, Duration) {
        match self {
            EffectKind::Charisma
            | EffectKind::Instinct
            | EffectKind::ManaBurst
            | EffectKind::ManaBurstFlame
            | EffectKind::Shapeshift => (EffectClass::Status, Duration::StartNextTurn),
            EffectKind::Stalking | EffectKind::CursedBarbs => {
                (EffectClass::Status, Duration::SourceNextTurn)
            }
            EffectKind::Burned => (EffectClass::Status, Duration::TurnCount),
            EffectKind::MadEnhancement
            | EffectKind::PreferredEnemy { .. }
            | EffectKind::GaeBolgCurse
            | EffectKind::MagicResistance => (EffectClass::Passive, Duration::Infinite),
            EffectKind::Healing => (EffectClass::Triggered, Duration::Instant),
            EffectKind::StatModifier { .. } => (EffectClass::Status, Duration::Infinite),
        }
    }

    pub fn save_stat(&self) -> Option<Stat> {
        match self {
            EffectKind::Burned => Some(Stat::Endurance),
            _ => None,
        }
    }

    /// Rank table for this kind. `None` for kinds authored with fixed values.
    pub fn rank_values(&self, rank: Rank) -> Option<RankValues> {
        let values = match self {
            EffectKind::Charisma
            | EffectKind::Instinct
            | EffectKind::ManaBurst
            | EffectKind::ManaBurstFlame
            | EffectKind::Shapeshift
            | EffectKind::Stalking
            | EffectKind::MadEnhancement => RankValues::bonus(rank),
            EffectKind::Burned => RankValues {
                bonus: 0,
                dc: rank.pick(&[11, 12, 13, 14, 15, 16], 0),
                dice: rank.pick(
                    &[
                        Dice::new(1, 4),
                        Dice::new(1, 6),
                        Dice::new(1, 8),
                        Dice::new(1, 10),
                        Dice::new(1, 12),
                        Dice::new(2, 6),
                    ],
                    Dice::NONE,
                ),
            },
            EffectKind::GaeBolgCurse | EffectKind::CursedBarbs => {
                RankValues::dc(rank, &[10, 11, 12, 13, 14, 15])
            }
            EffectKind::Healing => RankValues {
                bonus: 0,
                dc: 0,
                dice: rank.pick(&HEALING_DICE, Dice::NONE),
            },
            EffectKind::PreferredEnemy { .. } | EffectKind::MagicResistance => RankValues {
                bonus: 0,
                dc: 0,
                dice: Dice::NONE,
            },
            EffectKind::StatModifier { .. } => return None,
        };
        Some(values)
    }

    /// Turn count for a TurnCount effect being applied.
    pub fn roll_turn_count(&self, authored: i32, rng: &mut dyn RandomSource) -> i32 {
        match self {
            // Two or three turns.
            EffectKind::Burned => 1 + rng.roll_die(2) as i32,
            _ => authored,
        }
    }

    pub fn hooks(&self) -> &'static [Timing] {
        match self {
            EffectKind::Charisma
            | EffectKind::Instinct
            | EffectKind::ManaBurst
            | EffectKind::Shapeshift
            | EffectKind::StatModifier { .. } => &[Timing::OnEquip, Timing::OnUnequip],
            EffectKind::MadEnhancement => {
                &[Timing::OnEquip, Timing::OnUnequip, Timing::OnHitSource]
            }
            EffectKind::ManaBurstFlame => &[Timing::OnHitSource, Timing::OnHitTarget],
            EffectKind::Stalking | EffectKind::MagicResistance => &[Timing::OnAttackTarget],
            EffectKind::Burned => &[Timing::TurnStart],
            EffectKind::PreferredEnemy { .. } => &[Timing::OnAttackSource],
            EffectKind::GaeBolgCurse => &[Timing::OnDamageSource],
            EffectKind::CursedBarbs => &[Timing::OnHitTarget],
            EffectKind::Healing => &[Timing::OnEquip],
        }
    }

    pub fn has_hook(&self, timing: Timing) -> bool {
        self.hooks().contains(&timing)
    }

    /// Run this kind's hook for `timing`. The effect's target is its owner.
    pub fn fire(
        &self,
        enc: &mut Encounter,
        effect: &AbilityEffect,
        timing: Timing,
        instance: Option<&mut dyn AbilityInstance>,
    ) -> Result<(), CombatError> {
        if !self.has_hook(timing) {
            return Ok(());
        }
        let Some(owner) = effect.target else {
            return Ok(());
        };

        match (self, timing) {
            (EffectKind::Charisma, Timing::OnEquip) => {
                enc.unit_mut(owner)?.effects.set_charisma(true);
            }
            (EffectKind::Charisma, Timing::OnUnequip) => {
                enc.unit_mut(owner)?.effects.set_charisma(false);
            }

            (EffectKind::Instinct, Timing::OnEquip) => {
                enc.sum_param(owner, Stat::CritThreat, effect.bonus)?;
                enc.sum_param(owner, Stat::Evasion, effect.bonus)?;
            }
            (EffectKind::Instinct, Timing::OnUnequip) => {
                enc.subtract_param(owner, Stat::CritThreat, effect.bonus)?;
                enc.subtract_param(owner, Stat::Evasion, effect.bonus)?;
            }

            (EffectKind::ManaBurst, Timing::OnEquip) => {
                enc.sum_param(owner, Stat::Strength, effect.bonus)?;
            }
            (EffectKind::ManaBurst, Timing::OnUnequip) => {
                enc.subtract_param(owner, Stat::Strength, effect.bonus)?;
            }

            (EffectKind::Shapeshift, Timing::OnEquip) => {
                enc.sum_param(owner, Stat::Armour, effect.bonus)?;
            }
            (EffectKind::Shapeshift, Timing::OnUnequip) => {
                enc.subtract_param(owner, Stat::Armour, effect.bonus)?;
            }

            (EffectKind::StatModifier { stat, amount }, Timing::OnEquip) => {
                enc.sum_param(owner, *stat, *amount)?;
            }
            (EffectKind::StatModifier { stat, amount }, Timing::OnUnequip) => {
                enc.subtract_param(owner, *stat, *amount)?;
            }

            (EffectKind::MadEnhancement, Timing::OnEquip) => {
                enc.sum_param(owner, Stat::MpGeneration, effect.bonus)?;
            }
            (EffectKind::MadEnhancement, Timing::OnUnequip) => {
                enc.subtract_param(owner, Stat::MpGeneration, effect.bonus)?;
            }
            (EffectKind::MadEnhancement, Timing::OnHitSource) => {
                if let Some(inst) = instance {
                    if inst.kind() == InstanceKind::Attack {
                        inst.add_damage_bonus(effect.bonus);
                    }
                }
            }

            (EffectKind::ManaBurstFlame, Timing::OnHitSource) => {
                if let Some(inst) = instance {
                    inst.add_damage_bonus(effect.bonus);
                }
            }
            (EffectKind::ManaBurstFlame, Timing::OnHitTarget) => {
                if let Some(inst) = instance {
                    let fire_spell =
                        inst.kind() == InstanceKind::Spell && inst.element() == Element::Fire;
                    let fire_weapon = inst.weapon_tags().iter().any(|t| t == TAG_FIRE);
                    if fire_spell || fire_weapon {
                        inst.add_armour_bonus(effect.bonus);
                    }
                }
            }

            (EffectKind::Stalking, Timing::OnAttackTarget) => {
                if let Some(inst) = instance {
                    let aimed = matches!(inst.kind(), InstanceKind::Attack | InstanceKind::Spell);
                    if aimed && Some(inst.source()) == effect.source {
                        inst.add_evasion_bonus(-effect.bonus);
                    }
                }
            }

            (EffectKind::Burned, Timing::TurnStart) => {
                let damage = enc.roll_raw(effect.dice, 0, Reroll::No);
                debug!(unit = %owner, damage, "burn damage");
                enc.damage_unit(owner, damage)?;
            }

            (EffectKind::PreferredEnemy { prey_tags }, Timing::OnAttackSource) => {
                if let Some(inst) = instance {
                    if inst.target_tags().iter().any(|t| prey_tags.contains(t)) {
                        inst.change_attack_advantage(Reroll::Advantage);
                    }
                }
            }

            (EffectKind::GaeBolgCurse, Timing::OnDamageSource) => {
                if let Some(inst) = instance {
                    if inst.kind() == InstanceKind::Attack {
                        let target = inst.target();
                        if enc.unit(target)?.is_alive() {
                            curse(enc, owner, target, inst.rank())?;
                        }
                    }
                }
            }

            (EffectKind::CursedBarbs, Timing::OnHitTarget) => {
                if let Some(inst) = instance {
                    if inst.kind() == InstanceKind::Effect {
                        inst.change_heal_advantage(Reroll::Disadvantage);
                    }
                }
            }

            (EffectKind::MagicResistance, Timing::OnAttackTarget) => {
                if let Some(inst) = instance {
                    inst.set_magic_resistance(effect.rank);
                }
            }

            (EffectKind::Healing, Timing::OnEquip) => {
                let source = effect.source.unwrap_or(owner);
                let (bonus, reroll) = match &instance {
                    Some(inst) => (inst.heal_bonus(), inst.heal_advantage()),
                    None => (0, Reroll::No),
                };
                let mana = enc.stat(source, Stat::Mana)?;
                let amount = enc.custom_roll(source, effect.dice, bonus + mana, reroll)?;
                enc.heal_unit(owner, amount)?;
            }

            _ => {}
        }
        Ok(())
    }
}

/// Inflict Cursed Barbs at the weapon's rank through an effect instance.
fn curse(enc: &mut Encounter, source: UnitId, target: UnitId, rank: Rank) -> Result<(), CombatError> {
    let barbs = AbilityEffect::new(EffectKind::CursedBarbs, rank);
    let mut instance = EffectInstance::new(enc, source, target, barbs, rank)?;
    instance.resolve(enc)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_hooks_declared() {
        assert!(EffectKind::Burned.has_hook(Timing::TurnStart));
        assert!(!EffectKind::Burned.has_hook(Timing::OnEquip));
        assert!(EffectKind::MadEnhancement.has_hook(Timing::OnHitSource));

        let instance_hooks = Timing::iter().filter(|t| t.needs_instance()).count();
        assert_eq!(instance_hooks, 6);
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            EffectKind::Healing.classification(),
            (EffectClass::Triggered, Duration::Instant)
        );
        assert_eq!(
            EffectKind::CursedBarbs.classification(),
            (EffectClass::Status, Duration::SourceNextTurn)
        );
        assert_eq!(EffectKind::CursedBarbs.save_stat(), None);
    }

    #[test]
    fn test_burn_lasts_two_or_three_turns() {
        let mut rng = crate::dice::GameRng::new(3);
        for _ in 0..50 {
            let turns = EffectKind::Burned.roll_turn_count(0, &mut rng);
            assert!((2..=3).contains(&turns));
        }
        assert_eq!(EffectKind::Instinct.roll_turn_count(4, &mut rng), 4);
    }

    #[test]
    fn test_stat_modifier_has_no_rank_table() {
        let kind = EffectKind::StatModifier {
            stat: Stat::Luck,
            amount: 3,
        };
        assert!(kind.rank_values(Rank::EX).is_none());
        assert_eq!(
            EffectKind::GaeBolgCurse.rank_values(Rank::A).unwrap().dc,
            14
        );
    }
}

//! Ability instances: one resolution of an attack, spell, effect or noble
//! phantasm against one target.
//!
//! Each instance carries the numbers effect hooks are allowed to bend. Hooks
//! see the instance through [`AbilityInstance`] and only call the
//! capabilities they need; every capability defaults to a no-op so that,
//! for example, magic resistance firing on an attack simply does nothing.

pub mod attack;
pub mod effect;
pub mod noble_phantasm;
pub mod spell;

use crate::dice::Reroll;
use crate::world::{Element, Rank, UnitId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceKind {
    Attack,
    Spell,
    Effect,
    NoblePhantasm,
}

/// The view of an in-flight instance that effect hooks receive.
pub trait AbilityInstance {
    fn kind(&self) -> InstanceKind;
    fn source(&self) -> UnitId;
    fn target(&self) -> UnitId;
    fn rank(&self) -> Rank;

    fn element(&self) -> Element {
        Element::Basic
    }

    fn weapon_tags(&self) -> &[String] {
        &[]
    }

    fn target_tags(&self) -> &[String];

    fn heal_bonus(&self) -> i32 {
        0
    }

    fn heal_advantage(&self) -> Reroll {
        Reroll::No
    }

    // Capabilities

    fn add_evasion_bonus(&mut self, _amount: i32) {}
    fn add_armour_bonus(&mut self, _amount: i32) {}
    fn add_damage_bonus(&mut self, _amount: i32) {}
    fn add_heal_bonus(&mut self, _amount: i32) {}
    fn add_save_bonus(&mut self, _amount: i32) {}
    fn change_attack_advantage(&mut self, _reroll: Reroll) {}
    fn change_crit_advantage(&mut self, _reroll: Reroll) {}
    fn change_damage_advantage(&mut self, _reroll: Reroll) {}
    fn change_heal_advantage(&mut self, _reroll: Reroll) {}
    fn change_save_advantage(&mut self, _reroll: Reroll) {}
    fn set_magic_resistance(&mut self, _rank: Rank) {}
}

/// Reborrow an optional instance for one hook call.
pub(crate) fn reborrow<'a>(
    instance: &'a mut Option<&mut dyn AbilityInstance>,
) -> Option<&'a mut dyn AbilityInstance> {
    match instance {
        Some(inst) => Some(&mut **inst as &mut dyn AbilityInstance),
        None => None,
    }
}

/// View a concrete instance as the optional argument hooks take.
pub(crate) fn hook<I: AbilityInstance>(instance: &mut I) -> Option<&mut dyn AbilityInstance> {
    Some(instance as &mut dyn AbilityInstance)
}

/// Whether a roll beats an evasion score. Ties miss.
pub fn hits(roll: i32, evasion: i32) -> bool {
    roll > evasion
}

/// Damage left after armour, if any gets through.
pub fn reduced_damage(damage: i32, armour: i32) -> Option<i32> {
    let reduced = damage - armour;
    (reduced > 0).then_some(reduced)
}

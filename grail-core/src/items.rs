//! Weapon and armour catalog, and equipping gear.

use crate::dice::Dice;
use crate::effects::{AbilityEffect, EffectKind, Timing};
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::params::Stat;
use crate::world::{Armour, Hand, Rank, UnitId, Weapon, TAG_RANGED, TAG_TWO_HANDED};
use tracing::debug;

const LONGSWORD_DICE: [Dice; 6] = [
    Dice::new(1, 6),
    Dice::new(1, 8),
    Dice::new(1, 10),
    Dice::new(1, 12),
    Dice::new(2, 6),
    Dice::new(2, 8),
];

const ARQUEBUS_DICE: [Dice; 6] = [
    Dice::new(2, 8),
    Dice::new(2, 10),
    Dice::new(2, 12),
    Dice::new(4, 6),
    Dice::new(3, 10),
    Dice::new(3, 12),
];

const CLARENT_DICE: [Dice; 6] = [
    Dice::new(1, 8),
    Dice::new(1, 10),
    Dice::new(1, 12),
    Dice::new(2, 6),
    Dice::new(2, 8),
    Dice::new(3, 6),
];

fn weapon(name: &str, rank: Rank, range: i32, dice: [Dice; 6]) -> Weapon {
    Weapon {
        name: name.to_string(),
        rank,
        tags: Vec::new(),
        range,
        dice,
        effects: Vec::new(),
    }
}

pub fn longsword(rank: Rank) -> Weapon {
    weapon("Longsword", rank, 1, LONGSWORD_DICE)
}

pub fn arquebus(rank: Rank) -> Weapon {
    let mut arquebus = weapon("Arquebus", rank, 12, ARQUEBUS_DICE);
    arquebus.tags = vec![TAG_RANGED.to_string(), TAG_TWO_HANDED.to_string()];
    arquebus
}

pub fn clarent(rank: Rank) -> Weapon {
    weapon("Clarent", rank, 1, CLARENT_DICE)
}

/// Cú Chulainn's spear. Wounds it deals carry Cursed Barbs.
pub fn gae_bolg(rank: Rank) -> Weapon {
    let mut spear = weapon("Gae Bolg", rank, 2, LONGSWORD_DICE);
    spear.effects = vec![AbilityEffect::new(EffectKind::GaeBolgCurse, rank)];
    spear
}

pub fn armour(name: impl Into<String>, rank: Rank) -> Armour {
    Armour {
        name: name.into(),
        rank,
        effects: Vec::new(),
    }
}

/// Look up a catalog weapon by name, case-insensitively.
pub fn weapon_by_name(name: &str, rank: Rank) -> Option<Weapon> {
    match name.to_lowercase().as_str() {
        "longsword" => Some(longsword(rank)),
        "arquebus" => Some(arquebus(rank)),
        "clarent" => Some(clarent(rank)),
        "gae bolg" | "gae_bolg" => Some(gae_bolg(rank)),
        _ => None,
    }
}

impl Encounter {
    /// Put a weapon in a hand, displacing whatever blocks it. A two-handed
    /// weapon always goes to the main hand and empties the off hand.
    pub fn equip_weapon(
        &mut self,
        unit: UnitId,
        mut weapon: Weapon,
        hand: Hand,
    ) -> Result<(), CombatError> {
        let two_handed = weapon.is_two_handed();
        let hand = if two_handed { Hand::Main } else { hand };

        self.unequip_weapon(unit, hand)?;
        if two_handed {
            self.unequip_weapon(unit, Hand::Off)?;
        } else if hand == Hand::Off && self.unit(unit)?.equipment.is_two_handed() {
            self.unequip_weapon(unit, Hand::Main)?;
        }

        for effect in &mut weapon.effects {
            effect.bind(unit, unit);
        }
        let bound = weapon.effects.clone();
        debug!(unit = %unit, weapon = %weapon.name, ?hand, "weapon equipped");
        let gear = &mut self.unit_mut(unit)?.equipment;
        match hand {
            Hand::Main => gear.main_hand = Some(weapon),
            Hand::Off => gear.off_hand = Some(weapon),
        }
        self.fire_gear(&bound, Timing::OnEquip)
    }

    /// Empty a hand, returning what was in it.
    pub fn unequip_weapon(
        &mut self,
        unit: UnitId,
        hand: Hand,
    ) -> Result<Option<Weapon>, CombatError> {
        let held = {
            let gear = &self.unit(unit)?.equipment;
            match hand {
                Hand::Main => gear.main_hand.clone(),
                Hand::Off => gear.off_hand.clone(),
            }
        };
        let Some(weapon) = held else {
            return Ok(None);
        };

        self.fire_gear(&weapon.effects, Timing::OnUnequip)?;
        let gear = &mut self.unit_mut(unit)?.equipment;
        match hand {
            Hand::Main => gear.main_hand = None,
            Hand::Off => gear.off_hand = None,
        }
        debug!(unit = %unit, weapon = %weapon.name, ?hand, "weapon unequipped");
        Ok(Some(weapon))
    }

    /// Wear armour, replacing any worn piece. Its score sums into Armour.
    pub fn equip_armour(&mut self, unit: UnitId, mut armour: Armour) -> Result<(), CombatError> {
        self.unequip_armour(unit)?;
        for effect in &mut armour.effects {
            effect.bind(unit, unit);
        }
        let bound = armour.effects.clone();
        self.sum_param(unit, Stat::Armour, armour.score())?;
        self.unit_mut(unit)?.equipment.armour = Some(armour);
        self.fire_gear(&bound, Timing::OnEquip)
    }

    pub fn unequip_armour(&mut self, unit: UnitId) -> Result<Option<Armour>, CombatError> {
        let Some(armour) = self.unit(unit)?.equipment.armour.clone() else {
            return Ok(None);
        };
        self.fire_gear(&armour.effects, Timing::OnUnequip)?;
        self.subtract_param(unit, Stat::Armour, armour.score())?;
        self.unit_mut(unit)?.equipment.armour = None;
        Ok(Some(armour))
    }

    fn fire_gear(&mut self, effects: &[AbilityEffect], timing: Timing) -> Result<(), CombatError> {
        for effect in effects {
            effect.kind.fire(self, effect, timing, None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use crate::world::Team;

    #[test]
    fn test_catalog() {
        assert_eq!(longsword(Rank::A).damage_dice(), Dice::new(2, 6));
        assert_eq!(arquebus(Rank::B).damage_dice(), Dice::new(4, 6));
        assert!(arquebus(Rank::E).is_ranged());
        assert_eq!(clarent(Rank::EX).damage_dice(), Dice::new(3, 6));
        assert_eq!(gae_bolg(Rank::C).damage_dice(), Dice::new(1, 10));
        assert_eq!(gae_bolg(Rank::C).effects.len(), 1);
        assert!(weapon_by_name("Gae Bolg", Rank::E).is_some());
        assert!(weapon_by_name("Excalibur", Rank::E).is_none());
    }

    #[test]
    fn test_two_handed_clears_off_hand() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        let enc = &mut harness.encounter;

        enc.equip_weapon(hero, longsword(Rank::E), Hand::Main).unwrap();
        enc.equip_weapon(hero, clarent(Rank::E), Hand::Off).unwrap();
        assert_eq!(enc.unit(hero).unwrap().equipment.attack_weapons().len(), 2);

        enc.equip_weapon(hero, arquebus(Rank::E), Hand::Off).unwrap();
        let gear = &enc.unit(hero).unwrap().equipment;
        assert!(gear.off_hand.is_none());
        assert_eq!(gear.main_hand.as_ref().unwrap().name, "Arquebus");
        assert_eq!(gear.attack_weapons().len(), 1);

        enc.equip_weapon(hero, longsword(Rank::E), Hand::Off).unwrap();
        let gear = &enc.unit(hero).unwrap().equipment;
        assert!(gear.main_hand.is_none());
        assert!(gear.off_hand.is_some());
    }

    #[test]
    fn test_armour_score() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Hero", Team::Good);
        let enc = &mut harness.encounter;

        enc.equip_armour(hero, armour("Plate", Rank::C)).unwrap();
        assert_eq!(enc.stat(hero, Stat::Armour).unwrap(), 3);
        enc.equip_armour(hero, armour("Mail", Rank::E)).unwrap();
        assert_eq!(enc.stat(hero, Stat::Armour).unwrap(), 1);
        assert_eq!(enc.unequip_armour(hero).unwrap().unwrap().name, "Mail");
        assert_eq!(enc.stat(hero, Stat::Armour).unwrap(), 0);
    }

    #[test]
    fn test_gear_effects_are_bound() {
        let mut harness = TestHarness::new();
        let lancer = harness.spawn_sample("Lancer", Team::Good);
        harness
            .encounter
            .equip_weapon(lancer, gae_bolg(Rank::B), Hand::Main)
            .unwrap();
        let unit = harness.encounter.unit(lancer).unwrap();
        let curse = unit.equipment.effects().next().unwrap();
        assert_eq!(curse.target, Some(lancer));
        assert!(unit.has_effect(curse.id));
    }
}

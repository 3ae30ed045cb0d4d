//! Servant loadouts.
//!
//! A servant is the main piece of equipment a player unit wears: a stat
//! block, gear, passives, skills, spells and a noble phantasm bundled under
//! one heroic spirit's name. Equipping one swaps the passives in, sums the
//! stats and equips the gear; unequipping undoes all of it.

use crate::abilities::{Ability, SkillKind};
use crate::effects::{AbilityEffect, EffectClass, EffectKind};
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::instance::noble_phantasm::{NoblePhantasm, TAG_PENDRAGON};
use crate::items;
use crate::params::{Stat, StatBlock};
use crate::spells::Spell;
use crate::world::{Armour, Hand, Rank, UnitId, Weapon};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servant {
    pub name: String,
    #[serde(default)]
    pub stats: StatBlock,
    #[serde(default)]
    pub main_hand: Option<Weapon>,
    #[serde(default)]
    pub off_hand: Option<Weapon>,
    #[serde(default)]
    pub armour: Option<Armour>,
    #[serde(default)]
    pub passives: Vec<AbilityEffect>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default)]
    pub spells: Vec<Spell>,
    #[serde(default)]
    pub noble_phantasm: Option<NoblePhantasm>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Servant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stats: StatBlock::new(),
            main_hand: None,
            off_hand: None,
            armour: None,
            passives: Vec::new(),
            abilities: Vec::new(),
            spells: Vec::new(),
            noble_phantasm: None,
            tags: Vec::new(),
        }
    }

    pub fn with_stat(mut self, stat: Stat, value: i32) -> Self {
        self.stats.insert(stat, value);
        self
    }
}

/// Saber of Red: Clarent in hand, Clarent Blood Arthur as her phantasm.
pub fn mordred() -> Servant {
    let mut servant = Servant::new("Mordred")
        .with_stat(Stat::Strength, 4)
        .with_stat(Stat::Endurance, 3)
        .with_stat(Stat::Agility, 3)
        .with_stat(Stat::Mana, 2)
        .with_stat(Stat::Luck, 2)
        .with_stat(Stat::Melee, 5);
    servant.main_hand = Some(items::clarent(Rank::A));
    servant.armour = Some(items::armour("Armour of Red", Rank::B));
    servant.passives = vec![AbilityEffect::new(EffectKind::MagicResistance, Rank::B)];
    servant.abilities = vec![
        Ability::new(SkillKind::ManaBurst, Rank::A),
        Ability::new(SkillKind::Instinct, Rank::B),
    ];
    servant.noble_phantasm = Some(NoblePhantasm::clarent_blood_arthur(Rank::A));
    servant.tags = vec!["Saber".to_string(), TAG_PENDRAGON.to_string()];
    servant
}

/// Lancer of Ulster with the cursed spear.
pub fn cu_chulainn() -> Servant {
    let mut servant = Servant::new("Cu Chulainn")
        .with_stat(Stat::Strength, 3)
        .with_stat(Stat::Endurance, 2)
        .with_stat(Stat::Agility, 5)
        .with_stat(Stat::Mana, 1)
        .with_stat(Stat::Melee, 4);
    servant.main_hand = Some(items::gae_bolg(Rank::B));
    servant.passives = vec![AbilityEffect::new(EffectKind::MagicResistance, Rank::C)];
    servant.abilities = vec![
        Ability::new(SkillKind::Instinct, Rank::C),
        Ability::new(SkillKind::Stalking, Rank::B),
    ];
    servant.tags = vec!["Lancer".to_string(), "Divine".to_string()];
    servant
}

pub fn servant_by_name(name: &str) -> Option<Servant> {
    match name.to_lowercase().as_str() {
        "mordred" => Some(mordred()),
        "cu chulainn" | "cu_chulainn" => Some(cu_chulainn()),
        _ => None,
    }
}

impl Encounter {
    /// Wear a servant, replacing any worn one.
    pub fn equip_servant(&mut self, unit: UnitId, servant: Servant) -> Result<(), CombatError> {
        self.unequip_servant(unit)?;

        let old_passives: Vec<_> = self
            .unit(unit)?
            .effects
            .list(EffectClass::Passive)
            .iter()
            .map(|e| e.id)
            .collect();
        for id in old_passives {
            self.remove_effect(unit, id)?;
        }
        for passive in &servant.passives {
            self.add_effect(unit, passive.clone(), None, None)?;
        }

        for (&stat, &delta) in &servant.stats {
            self.sum_param(unit, stat, delta)?;
        }

        if let Some(weapon) = servant.main_hand.clone() {
            self.equip_weapon(unit, weapon, Hand::Main)?;
        }
        if let Some(weapon) = servant.off_hand.clone() {
            self.equip_weapon(unit, weapon, Hand::Off)?;
        }
        if let Some(armour) = servant.armour.clone() {
            self.equip_armour(unit, armour)?;
        }

        info!(unit = %unit, servant = %servant.name, "servant equipped");
        let target = self.unit_mut(unit)?;
        target.abilities = servant.abilities.clone();
        target.spells = servant.spells.clone();
        target.noble_phantasm = servant.noble_phantasm.clone();
        for tag in &servant.tags {
            if !target.has_tag(tag) {
                target.tags.push(tag.clone());
            }
        }
        target.servant = Some(servant);
        Ok(())
    }

    /// Take off the worn servant and everything it brought. Returns it.
    pub fn unequip_servant(&mut self, unit: UnitId) -> Result<Option<Servant>, CombatError> {
        let Some(servant) = self.unit_mut(unit)?.servant.take() else {
            return Ok(None);
        };

        let passives: Vec<_> = self
            .unit(unit)?
            .effects
            .list(EffectClass::Passive)
            .iter()
            .filter(|e| servant.passives.iter().any(|p| p.same_as(e)))
            .map(|e| e.id)
            .collect();
        for id in passives {
            self.remove_effect(unit, id)?;
        }

        for (&stat, &delta) in &servant.stats {
            self.subtract_param(unit, stat, delta)?;
        }

        self.unequip_weapon(unit, Hand::Main)?;
        self.unequip_weapon(unit, Hand::Off)?;
        self.unequip_armour(unit)?;

        info!(unit = %unit, servant = %servant.name, "servant unequipped");
        let target = self.unit_mut(unit)?;
        target.abilities.clear();
        target.spells.clear();
        target.noble_phantasm = None;
        target.tags.retain(|t| !servant.tags.contains(t));
        Ok(Some(servant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::noble_phantasm::TAG_KING;
    use crate::testing::TestHarness;
    use crate::world::Team;

    #[test]
    fn test_equip_servant_loads_everything() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Master", Team::Good);
        harness.encounter.equip_servant(hero, mordred()).unwrap();

        let enc = &harness.encounter;
        let unit = enc.unit(hero).unwrap();
        assert_eq!(unit.stat(Stat::Strength), 4);
        assert_eq!(unit.stat(Stat::Movement), 9);
        assert_eq!(unit.stat(Stat::Evasion), 13);
        assert_eq!(unit.stat(Stat::Armour), 4);
        assert_eq!(unit.equipment.main_hand.as_ref().unwrap().name, "Clarent");
        assert_eq!(unit.abilities.len(), 2);
        assert!(unit.noble_phantasm.is_some());
        assert!(unit.has_tag(TAG_PENDRAGON));
        assert_eq!(unit.effects.list(EffectClass::Passive).len(), 1);
    }

    #[test]
    fn test_unequip_servant_reverses() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Master", Team::Good);
        harness.encounter.equip_servant(hero, cu_chulainn()).unwrap();
        let servant = harness.encounter.unequip_servant(hero).unwrap().unwrap();
        assert_eq!(servant.name, "Cu Chulainn");

        let unit = harness.encounter.unit(hero).unwrap();
        assert_eq!(unit.stat(Stat::Agility), 0);
        assert_eq!(unit.stat(Stat::Evasion), 10);
        assert!(unit.equipment.main_hand.is_none());
        assert!(unit.effects.is_empty());
        assert!(unit.abilities.is_empty());
        assert!(unit.tags.is_empty());
        assert!(harness.encounter.unequip_servant(hero).unwrap().is_none());
    }

    #[test]
    fn test_swapping_servants_swaps_passives() {
        let mut harness = TestHarness::new();
        let hero = harness.spawn_sample("Master", Team::Good);
        harness.encounter.equip_servant(hero, mordred()).unwrap();
        harness.encounter.equip_servant(hero, cu_chulainn()).unwrap();

        let unit = harness.encounter.unit(hero).unwrap();
        let passives = unit.effects.list(EffectClass::Passive);
        assert_eq!(passives.len(), 1);
        assert_eq!(passives[0].rank, Rank::C);
        assert_eq!(unit.stat(Stat::Armour), 0);
        assert!(!unit.has_tag(TAG_KING));
    }
}

//! Combat world types.
//!
//! Contains the types that describe a unit on the battlefield: identifiers,
//! ranks, teams, weapons, armour and the unit itself.

use crate::abilities::Ability;
use crate::dice::Dice;
use crate::effects::{AbilityEffect, EffectRegistry};
use crate::instance::noble_phantasm::NoblePhantasm;
use crate::params::{ParameterGraph, Stat, StatBlock};
use crate::servant::Servant;
use crate::spells::Spell;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter};
use uuid::Uuid;

/// MP ceiling for every unit.
pub const MAX_MP: i32 = 100;

/// Actions granted per turn unless configured otherwise.
pub const DEFAULT_MAX_ACTIONS: i32 = 3;

// ============================================================================
// ID Types
// ============================================================================

/// Handle to a unit in the encounter arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub usize);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for an applied effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectId(pub Uuid);

impl EffectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ranks, Teams, Elements
// ============================================================================

/// Strength tier that scales most values in the game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    Display,
)]
pub enum Rank {
    #[default]
    None,
    E,
    D,
    C,
    B,
    A,
    EX,
}

impl Rank {
    /// Position in a six-entry `E..EX` table.
    pub fn index(self) -> Option<usize> {
        match self {
            Rank::None => None,
            Rank::E => Some(0),
            Rank::D => Some(1),
            Rank::C => Some(2),
            Rank::B => Some(3),
            Rank::A => Some(4),
            Rank::EX => Some(5),
        }
    }

    /// Look up this rank in an `E..EX` table, falling back to `default` for
    /// `Rank::None`.
    pub fn pick<T: Copy>(self, table: &[T; 6], default: T) -> T {
        self.index().map(|i| table[i]).unwrap_or(default)
    }

    /// The standard 1..6 rank bonus.
    pub fn bonus(self) -> i32 {
        self.pick(&[1, 2, 3, 4, 5, 6], 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Team {
    Good,
    Evil,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Good => Team::Evil,
            Team::Evil => Team::Good,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
pub enum Element {
    Air,
    #[default]
    Basic,
    Earth,
    Ether,
    Fire,
    ImaginaryNumbers,
    Water,
}

/// Who an ability or spell may be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    Hostile,
    Friendly,
    Myself,
    Any,
}

/// Unit class, which fixes maximum health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
pub enum UnitClass {
    #[default]
    Standard,
    Minion,
    Player,
    Heavy,
    Elite,
    Boss,
}

impl UnitClass {
    pub fn max_hp(self) -> i32 {
        match self {
            UnitClass::Standard => 25,
            UnitClass::Minion => 1,
            UnitClass::Player => 100,
            UnitClass::Heavy => 100,
            UnitClass::Elite => 50,
            UnitClass::Boss => 300,
        }
    }
}

// ============================================================================
// Equipment
// ============================================================================

pub const TAG_RANGED: &str = "Ranged";
pub const TAG_FIRE: &str = "Fire";
pub const TAG_TWO_HANDED: &str = "Two-Handed";

/// A weapon with per-rank damage dice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub rank: Rank,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub range: i32,
    /// Damage dice for ranks E..EX.
    pub dice: [Dice; 6],
    #[serde(default)]
    pub effects: Vec<AbilityEffect>,
}

impl Weapon {
    pub fn damage_dice(&self) -> Dice {
        self.rank.pick(&self.dice, Dice::NONE)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_ranged(&self) -> bool {
        self.has_tag(TAG_RANGED)
    }

    pub fn is_two_handed(&self) -> bool {
        self.has_tag(TAG_TWO_HANDED)
    }
}

/// A piece of armour. Its score (1..6 for E..EX) sums into Armour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Armour {
    pub name: String,
    pub rank: Rank,
    #[serde(default)]
    pub effects: Vec<AbilityEffect>,
}

impl Armour {
    pub fn score(&self) -> i32 {
        self.rank.bonus()
    }
}

/// Which weapon slot an item goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hand {
    Main,
    Off,
}

/// Equipped gear.
///
/// A two-handed weapon sits in the main hand and blocks the off hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub main_hand: Option<Weapon>,
    pub off_hand: Option<Weapon>,
    pub armour: Option<Armour>,
}

impl Equipment {
    /// One entry per attack the unit makes: the main hand, then the off
    /// hand. Empty hands yield a single unarmed (`None`) entry.
    pub fn attack_weapons(&self) -> Vec<Option<Weapon>> {
        let weapons: Vec<Option<Weapon>> = [&self.main_hand, &self.off_hand]
            .into_iter()
            .flatten()
            .cloned()
            .map(Some)
            .collect();
        if weapons.is_empty() {
            vec![None]
        } else {
            weapons
        }
    }

    /// Effects carried by gear, main hand then off hand then armour.
    pub fn effects(&self) -> impl Iterator<Item = &AbilityEffect> {
        let main = self.main_hand.iter().flat_map(|w| w.effects.iter());
        let off = self.off_hand.iter().flat_map(|w| w.effects.iter());
        let armour = self.armour.iter().flat_map(|a| a.effects.iter());
        main.chain(off).chain(armour)
    }

    pub fn is_two_handed(&self) -> bool {
        self.main_hand.as_ref().is_some_and(|w| w.is_two_handed())
    }
}

// ============================================================================
// Units
// ============================================================================

/// A combatant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub team: Team,
    pub class: UnitClass,
    pub tags: Vec<String>,
    pub hp: i32,
    pub max_hp: i32,
    pub mp: i32,
    pub initiative: i32,
    pub actions: i32,
    pub max_actions: i32,
    pub is_turn_unit: bool,
    pub alive: bool,
    pub summoner: Option<UnitId>,
    pub params: ParameterGraph,
    pub effects: EffectRegistry,
    pub equipment: Equipment,
    pub abilities: Vec<Ability>,
    pub spells: Vec<Spell>,
    pub noble_phantasm: Option<NoblePhantasm>,
    /// The servant loadout currently worn, if any.
    #[serde(default)]
    pub servant: Option<Servant>,
}

impl Unit {
    /// A fresh unit at full health with the standard parameter set. The id
    /// is assigned when it joins an encounter.
    pub fn new(name: impl Into<String>, team: Team, class: UnitClass) -> Self {
        let max_hp = class.max_hp();
        Self {
            id: UnitId(0),
            name: name.into(),
            team,
            class,
            tags: Vec::new(),
            hp: max_hp,
            max_hp,
            mp: 0,
            initiative: 0,
            actions: 0,
            max_actions: DEFAULT_MAX_ACTIONS,
            is_turn_unit: false,
            alive: true,
            summoner: None,
            params: ParameterGraph::standard(),
            effects: EffectRegistry::default(),
            equipment: Equipment::default(),
            abilities: Vec::new(),
            spells: Vec::new(),
            noble_phantasm: None,
            servant: None,
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_stats(mut self, stats: &StatBlock) -> Self {
        self.params.sum_all(stats);
        self.params.drain_changes();
        self
    }

    pub fn with_abilities(mut self, abilities: Vec<Ability>) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_spells(mut self, spells: Vec<Spell>) -> Self {
        self.spells = spells;
        self
    }

    pub fn with_noble_phantasm(mut self, np: NoblePhantasm) -> Self {
        self.noble_phantasm = Some(np);
        self
    }

    pub fn stat(&self, stat: Stat) -> i32 {
        self.params.get(stat)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.has_tag(t))
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether the effect is filed in the registry or carried by gear.
    pub fn has_effect(&self, id: EffectId) -> bool {
        self.effects.contains(id) || self.equipment.effects().any(|e| e.id == id)
    }

    /// Heal, capped at max HP. Returns the amount actually restored.
    pub fn increase_health(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0)).min(self.max_hp);
        self.hp - before
    }

    /// Take damage, floored at 0. Returns the new HP.
    pub fn reduce_health(&mut self, amount: i32) -> i32 {
        self.hp = (self.hp - amount.max(0)).max(0);
        self.hp
    }

    /// Gain MP, capped at [`MAX_MP`].
    pub fn increase_mp(&mut self, amount: i32) {
        self.mp = (self.mp + amount).clamp(0, MAX_MP);
    }

    /// Whether a cost can be paid, from MP or by bleeding HP for the
    /// shortfall without dropping to 0.
    pub fn mp_spend_check(&self, cost: i32) -> bool {
        self.mp >= cost || self.hp - (cost - self.mp) > 0
    }

    /// Pay a mana cost. A shortfall is taken from HP. Returns false and
    /// changes nothing when the unit cannot afford it.
    pub fn spend_mana(&mut self, cost: i32) -> bool {
        if self.mp >= cost {
            self.mp -= cost;
            return true;
        }
        let shortfall = cost - self.mp;
        if self.hp - shortfall <= 0 {
            return false;
        }
        self.mp = 0;
        self.hp -= shortfall;
        true
    }

    pub fn reset_ability_uses(&mut self) {
        for ability in &mut self.abilities {
            ability.current_uses = 0;
        }
    }
}

/// A plain standard-class unit with no stats, gear or abilities.
pub fn create_sample_unit(name: impl Into<String>, team: Team) -> Unit {
    Unit::new(name, team, UnitClass::Standard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_pick() {
        let table = [10, 11, 12, 13, 14, 15];
        assert_eq!(Rank::E.pick(&table, 0), 10);
        assert_eq!(Rank::EX.pick(&table, 0), 15);
        assert_eq!(Rank::None.pick(&table, -1), -1);
        assert_eq!(Rank::B.bonus(), 4);
        assert!(Rank::None < Rank::E && Rank::A < Rank::EX);
    }

    #[test]
    fn test_class_health() {
        let boss = Unit::new("Boss", Team::Evil, UnitClass::Boss);
        assert_eq!(boss.hp, 300);
        assert_eq!(boss.max_hp, 300);
        assert_eq!(boss.mp, 0);
        assert_eq!(UnitClass::Minion.max_hp(), 1);
    }

    #[test]
    fn test_mana_paid_from_mp() {
        let mut unit = create_sample_unit("Caster", Team::Good);
        unit.mp = 10;
        assert!(unit.spend_mana(4));
        assert_eq!(unit.mp, 6);
        assert_eq!(unit.hp, 25);
    }

    #[test]
    fn test_mana_shortfall_bleeds_health() {
        let mut unit = create_sample_unit("Caster", Team::Good);
        unit.mp = 3;
        assert!(unit.spend_mana(10));
        assert_eq!(unit.mp, 0);
        assert_eq!(unit.hp, 18);
    }

    #[test]
    fn test_mana_refused_without_state_change() {
        let mut unit = create_sample_unit("Caster", Team::Good);
        unit.mp = 5;
        unit.hp = 5;
        assert!(!unit.mp_spend_check(10));
        assert!(!unit.spend_mana(10));
        assert_eq!(unit.mp, 5);
        assert_eq!(unit.hp, 5);
    }

    #[test]
    fn test_health_caps() {
        let mut unit = create_sample_unit("Tank", Team::Good);
        unit.hp = 20;
        assert_eq!(unit.increase_health(10), 5);
        assert_eq!(unit.hp, 25);
        assert_eq!(unit.reduce_health(40), 0);

        unit.increase_mp(150);
        assert_eq!(unit.mp, MAX_MP);
    }

    #[test]
    fn test_attack_weapons() {
        let mut gear = Equipment::default();
        assert_eq!(gear.attack_weapons(), vec![None]);

        let sword = Weapon {
            name: "Sword".to_string(),
            rank: Rank::E,
            tags: vec![],
            range: 1,
            dice: [Dice::new(1, 6); 6],
            effects: vec![],
        };
        gear.main_hand = Some(sword.clone());
        gear.off_hand = Some(sword.clone());
        assert_eq!(gear.attack_weapons().len(), 2);

        gear.off_hand = None;
        assert_eq!(gear.attack_weapons(), vec![Some(sword)]);
    }
}

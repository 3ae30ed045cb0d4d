//! Rosters: encounter setups loaded from JSON or built in code.
//!
//! A roster names its units by template. Gear, spells and servants are
//! referred to by catalog name and rank, so a roster file stays short:
//!
//! ```json
//! {
//!   "config": { "name": "Castle Gate", "seed": 7 },
//!   "units": [
//!     { "name": "Saber", "team": "Good", "class": "Player", "servant": "Mordred" },
//!     { "name": "Ghoul", "team": "Evil", "main_hand": { "name": "Longsword", "rank": "E" } }
//!   ]
//! }
//! ```

use crate::abilities::{Ability, SkillKind};
use crate::effects::{AbilityEffect, EffectKind};
use crate::encounter::{Encounter, EncounterConfig};
use crate::error::CombatError;
use crate::instance::noble_phantasm::NoblePhantasm;
use crate::items;
use crate::params::{Stat, StatBlock};
use crate::servant;
use crate::spells::{Spell, SpellKind, TAG_ZOMBIE};
use crate::world::{Element, Hand, Rank, Team, Unit, UnitClass, UnitId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A catalog item at a rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub name: String,
    pub rank: Rank,
}

impl ItemRef {
    pub fn new(name: impl Into<String>, rank: Rank) -> Self {
        Self {
            name: name.into(),
            rank,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRef {
    pub kind: SkillKind,
    pub rank: Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellRef {
    pub kind: SpellKind,
    pub rank: Rank,
    #[serde(default)]
    pub element: Element,
}

impl SpellRef {
    pub fn spell(&self) -> Spell {
        match self.kind {
            SpellKind::ElementalBurst => Spell::elemental_burst(self.rank, self.element),
            SpellKind::ElementalBolt => Spell::elemental_bolt(self.rank, self.element),
            SpellKind::Heal => Spell::heal(self.rank),
            SpellKind::SummonZombies => Spell::summon_zombies(self.rank),
        }
    }
}

/// Everything needed to put one unit on the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTemplate {
    pub name: String,
    pub team: Team,
    #[serde(default)]
    pub class: UnitClass,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub stats: StatBlock,
    #[serde(default)]
    pub servant: Option<String>,
    #[serde(default)]
    pub main_hand: Option<ItemRef>,
    #[serde(default)]
    pub off_hand: Option<ItemRef>,
    #[serde(default)]
    pub armour: Option<ItemRef>,
    #[serde(default)]
    pub passives: Vec<AbilityEffect>,
    #[serde(default)]
    pub abilities: Vec<SkillRef>,
    #[serde(default)]
    pub spells: Vec<SpellRef>,
    #[serde(default)]
    pub noble_phantasm: Option<NoblePhantasm>,
}

impl UnitTemplate {
    /// A bare template: no stats, gear or abilities.
    pub fn new(name: impl Into<String>, team: Team, class: UnitClass) -> Self {
        Self {
            name: name.into(),
            team,
            class,
            tags: Vec::new(),
            stats: StatBlock::new(),
            servant: None,
            main_hand: None,
            off_hand: None,
            armour: None,
            passives: Vec::new(),
            abilities: Vec::new(),
            spells: Vec::new(),
            noble_phantasm: None,
        }
    }

    /// Spawn this unit into an encounter and equip everything it carries.
    /// A servant replaces the template's own abilities, spells and phantasm.
    /// Catalog names that do not resolve are an error.
    pub fn deploy(&self, enc: &mut Encounter) -> Result<UnitId, CombatError> {
        let mut unit = Unit::new(&self.name, self.team, self.class)
            .with_tags(self.tags.iter().cloned())
            .with_stats(&self.stats)
            .with_abilities(
                self.abilities
                    .iter()
                    .map(|s| Ability::new(s.kind, s.rank))
                    .collect(),
            )
            .with_spells(self.spells.iter().map(SpellRef::spell).collect());
        unit.noble_phantasm = self.noble_phantasm.clone();

        let id = if enc.is_started() {
            enc.add_unit(unit, None)?
        } else {
            enc.spawn(unit)
        };

        if let Some(name) = &self.servant {
            let servant = servant::servant_by_name(name)
                .ok_or_else(|| CombatError::UnknownItem(name.clone()))?;
            enc.equip_servant(id, servant)?;
        }
        for (slot, hand) in [(&self.main_hand, Hand::Main), (&self.off_hand, Hand::Off)] {
            if let Some(item) = slot {
                let weapon = items::weapon_by_name(&item.name, item.rank)
                    .ok_or_else(|| CombatError::UnknownItem(item.name.clone()))?;
                enc.equip_weapon(id, weapon, hand)?;
            }
        }
        if let Some(item) = &self.armour {
            enc.equip_armour(id, items::armour(&item.name, item.rank))?;
        }
        for passive in &self.passives {
            enc.add_effect(id, passive.clone(), None, None)?;
        }
        Ok(id)
    }
}

/// Error returned when a unit template is incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    MissingName,
    MissingTeam,
}

impl std::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuilderError::MissingName => write!(f, "Unit name is required"),
            BuilderError::MissingTeam => write!(f, "Team selection is required"),
        }
    }
}

impl std::error::Error for BuilderError {}

/// Builder for unit templates.
#[derive(Debug, Clone, Default)]
pub struct UnitBuilder {
    name: Option<String>,
    team: Option<Team>,
    class: UnitClass,
    tags: Vec<String>,
    stats: StatBlock,
    servant: Option<String>,
    main_hand: Option<ItemRef>,
    off_hand: Option<ItemRef>,
    armour: Option<ItemRef>,
    passives: Vec<AbilityEffect>,
    abilities: Vec<SkillRef>,
    spells: Vec<SpellRef>,
    noble_phantasm: Option<NoblePhantasm>,
}

impl UnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn team(mut self, team: Team) -> Self {
        self.team = Some(team);
        self
    }

    pub fn class(mut self, class: UnitClass) -> Self {
        self.class = class;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn stat(mut self, stat: Stat, value: i32) -> Self {
        *self.stats.entry(stat).or_insert(0) += value;
        self
    }

    pub fn servant(mut self, name: impl Into<String>) -> Self {
        self.servant = Some(name.into());
        self
    }

    pub fn main_hand(mut self, name: impl Into<String>, rank: Rank) -> Self {
        self.main_hand = Some(ItemRef::new(name, rank));
        self
    }

    pub fn off_hand(mut self, name: impl Into<String>, rank: Rank) -> Self {
        self.off_hand = Some(ItemRef::new(name, rank));
        self
    }

    pub fn armour(mut self, name: impl Into<String>, rank: Rank) -> Self {
        self.armour = Some(ItemRef::new(name, rank));
        self
    }

    pub fn passive(mut self, effect: AbilityEffect) -> Self {
        self.passives.push(effect);
        self
    }

    pub fn ability(mut self, kind: SkillKind, rank: Rank) -> Self {
        self.abilities.push(SkillRef { kind, rank });
        self
    }

    pub fn spell(mut self, kind: SpellKind, rank: Rank, element: Element) -> Self {
        self.spells.push(SpellRef {
            kind,
            rank,
            element,
        });
        self
    }

    pub fn noble_phantasm(mut self, np: NoblePhantasm) -> Self {
        self.noble_phantasm = Some(np);
        self
    }

    pub fn build(self) -> Result<UnitTemplate, BuilderError> {
        let name = self.name.ok_or(BuilderError::MissingName)?;
        let team = self.team.ok_or(BuilderError::MissingTeam)?;
        Ok(UnitTemplate {
            name,
            team,
            class: self.class,
            tags: self.tags,
            stats: self.stats,
            servant: self.servant,
            main_hand: self.main_hand,
            off_hand: self.off_hand,
            armour: self.armour,
            passives: self.passives,
            abilities: self.abilities,
            spells: self.spells,
            noble_phantasm: self.noble_phantasm,
        })
    }
}

/// An encounter setup: configuration plus the units taking part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub config: EncounterConfig,
    pub units: Vec<UnitTemplate>,
}

impl Roster {
    pub fn from_json(json: &str) -> Result<Self, CombatError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CombatError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, CombatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the encounter with every unit deployed, ready to start.
    pub fn into_encounter(self) -> Result<(Encounter, Vec<UnitId>), CombatError> {
        let mut enc = Encounter::new(self.config);
        let ids = self
            .units
            .iter()
            .map(|template| template.deploy(&mut enc))
            .collect::<Result<Vec<_>, _>>()?;
        info!(units = ids.len(), name = %enc.config().name, "roster deployed");
        Ok((enc, ids))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A player unit wearing Mordred.
pub fn sample_saber() -> UnitTemplate {
    let mut saber = UnitTemplate::new("Saber", Team::Good, UnitClass::Player);
    saber.servant = Some("Mordred".to_string());
    saber
}

pub fn sample_lancer() -> UnitTemplate {
    let mut lancer = UnitTemplate::new("Lancer", Team::Good, UnitClass::Player);
    lancer.servant = Some("Cu Chulainn".to_string());
    lancer
}

pub fn sample_zombie() -> UnitTemplate {
    let mut zombie = UnitTemplate::new("Zombie", Team::Evil, UnitClass::Minion);
    zombie.tags.push(TAG_ZOMBIE.to_string());
    zombie
}

/// An elite necromancer that raises zombies and throws bolts.
pub fn zombie_caster() -> UnitTemplate {
    let mut caster = UnitTemplate::new("Necromancer", Team::Evil, UnitClass::Elite);
    caster.stats = StatBlock::from([(Stat::Agility, 1), (Stat::Mana, 3), (Stat::Spellcraft, 4)]);
    caster.spells = vec![
        SpellRef {
            kind: SpellKind::SummonZombies,
            rank: Rank::C,
            element: Element::Basic,
        },
        SpellRef {
            kind: SpellKind::ElementalBolt,
            rank: Rank::C,
            element: Element::Ether,
        },
    ];
    caster
}

/// The Demon King of the Sixth Heaven, boss of the demo.
pub fn nobunaga() -> UnitTemplate {
    let mut boss = UnitTemplate::new("Oda Nobunaga", Team::Evil, UnitClass::Boss);
    boss.tags = vec!["Archer".to_string(), "Demon King".to_string()];
    boss.stats = StatBlock::from([
        (Stat::Strength, 2),
        (Stat::Agility, 3),
        (Stat::Mana, 4),
        (Stat::Luck, 4),
        (Stat::Melee, 2),
        (Stat::Ranged, 5),
    ]);
    boss.main_hand = Some(ItemRef::new("Arquebus", Rank::B));
    boss.armour = Some(ItemRef::new("Western Armour", Rank::C));
    boss.passives = vec![AbilityEffect::new(EffectKind::MagicResistance, Rank::D)];
    boss.abilities = vec![SkillRef {
        kind: SkillKind::Charisma,
        rank: Rank::B,
    }];
    boss.spells = vec![SpellRef {
        kind: SpellKind::ElementalBurst,
        rank: Rank::B,
        element: Element::Fire,
    }];
    boss.noble_phantasm = Some(NoblePhantasm::three_thousand_worlds(Rank::A));
    boss
}

/// Two servants against Nobunaga, a necromancer and a pair of zombies.
pub fn demo_roster() -> Roster {
    Roster {
        config: EncounterConfig::new("Honnō-ji"),
        units: vec![
            sample_saber(),
            sample_lancer(),
            nobunaga(),
            zombie_caster(),
            sample_zombie(),
            sample_zombie(),
        ],
    }
}

//! Spell instances.

use super::effect::{EffectInstance, EffectOutcome};
use super::{hits, hook, reduced_damage, AbilityInstance, InstanceKind};
use crate::dice::Reroll;
use crate::effects::Timing;
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::CombatEvent;
use crate::params::Stat;
use crate::spells::Spell;
use crate::world::{Element, Rank, UnitId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of one spell instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellOutcome {
    pub target: UnitId,
    pub hit: bool,
    /// Magic resistance at or above the spell's rank cancelled it.
    pub voided: bool,
    pub damage: Option<i32>,
    pub effect: Option<EffectOutcome>,
}

#[derive(Debug, Clone)]
pub struct SpellInstance {
    pub source: UnitId,
    pub target: UnitId,
    pub spell: Spell,
    target_tags: Vec<String>,
    pub spellcraft: i32,
    pub evasion: i32,
    pub mana: i32,
    pub armour: i32,
    pub damage_bonus: i32,
    pub attack_advantage: Reroll,
    pub damage_advantage: Reroll,
    pub resistance: Rank,
}

impl SpellInstance {
    pub fn new(
        enc: &Encounter,
        source: UnitId,
        target: UnitId,
        spell: Spell,
    ) -> Result<Self, CombatError> {
        enc.unit(source)?;
        let target_tags = enc.unit(target)?.tags.clone();
        Ok(Self {
            source,
            target,
            spell,
            target_tags,
            spellcraft: 0,
            evasion: 0,
            mana: 0,
            armour: 0,
            damage_bonus: 0,
            attack_advantage: Reroll::No,
            damage_advantage: Reroll::No,
            resistance: Rank::None,
        })
    }

    pub fn resolve(&mut self, enc: &mut Encounter) -> Result<SpellOutcome, CombatError> {
        self.spellcraft = enc.stat(self.source, Stat::Spellcraft)?;
        self.evasion = enc.stat(self.target, Stat::Evasion)?;
        enc.search(self.source, Timing::OnAttackSource, hook(self))?;
        enc.search(self.target, Timing::OnAttackTarget, hook(self))?;

        if self.spell.hit_roll {
            let roll = enc.basic_roll(self.source, self.spellcraft, self.attack_advantage)?;
            if !hits(roll, self.evasion) {
                debug!(spell = %self.spell.name, target = %self.target, roll, evasion = self.evasion, "spell missed");
                return Ok(self.report(enc, false, false, None, None));
            }
        }

        self.mana = enc.stat(self.source, Stat::Mana)?;
        self.armour = enc.stat(self.target, Stat::Armour)?;
        enc.search(self.source, Timing::OnHitSource, hook(self))?;
        enc.search(self.target, Timing::OnHitTarget, hook(self))?;

        if self.spell.rank <= self.resistance {
            debug!(spell = %self.spell.name, target = %self.target, resistance = %self.resistance, "spell voided");
            return Ok(self.report(enc, true, true, None, None));
        }

        let mut dealt = None;
        if self.spell.damage_dealing {
            let damage = enc.custom_roll(
                self.source,
                self.spell.dice(),
                self.damage_bonus + self.mana,
                self.damage_advantage,
            )?;
            dealt = reduced_damage(damage, self.armour);
            if let Some(amount) = dealt {
                enc.damage_unit(self.target, amount)?;
                enc.search(self.source, Timing::OnDamageSource, hook(self))?;
                enc.search(self.target, Timing::OnDamageTarget, hook(self))?;
            }
        }

        let mut effect = None;
        if let Some(authored) = self.spell.effect.clone() {
            if enc.unit(self.target)?.is_alive() {
                let mut instance =
                    EffectInstance::new(enc, self.source, self.target, authored, self.spell.rank)?;
                effect = Some(instance.resolve(enc)?);
            }
        }

        Ok(self.report(enc, true, false, dealt, effect))
    }

    fn report(
        &self,
        enc: &mut Encounter,
        hit: bool,
        voided: bool,
        damage: Option<i32>,
        effect: Option<EffectOutcome>,
    ) -> SpellOutcome {
        enc.emit(CombatEvent::SpellResolved {
            source: self.source,
            target: self.target,
            spell: self.spell.name.clone(),
            hit,
            voided,
            damage,
        });
        SpellOutcome {
            target: self.target,
            hit,
            voided,
            damage,
            effect,
        }
    }
}

impl AbilityInstance for SpellInstance {
    fn kind(&self) -> InstanceKind {
        InstanceKind::Spell
    }

    fn source(&self) -> UnitId {
        self.source
    }

    fn target(&self) -> UnitId {
        self.target
    }

    fn rank(&self) -> Rank {
        self.spell.rank
    }

    fn element(&self) -> Element {
        self.spell.element
    }

    fn target_tags(&self) -> &[String] {
        &self.target_tags
    }

    fn add_evasion_bonus(&mut self, amount: i32) {
        self.evasion += amount;
    }

    fn add_armour_bonus(&mut self, amount: i32) {
        self.armour += amount;
    }

    fn add_damage_bonus(&mut self, amount: i32) {
        self.damage_bonus += amount;
    }

    fn change_attack_advantage(&mut self, reroll: Reroll) {
        self.attack_advantage = self.attack_advantage.combine(reroll);
    }

    fn change_damage_advantage(&mut self, reroll: Reroll) {
        self.damage_advantage = self.damage_advantage.combine(reroll);
    }

    fn set_magic_resistance(&mut self, rank: Rank) {
        self.resistance = rank;
    }
}

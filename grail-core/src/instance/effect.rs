//! Effect instances: delivering an effect to a unit, saving throw first.

use super::{hook, AbilityInstance, InstanceKind};
use crate::dice::Reroll;
use crate::effects::{AbilityEffect, SavingThrow, Timing};
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::CombatEvent;
use crate::world::{EffectId, Rank, UnitId};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectOutcome {
    /// The effect landed. `None` when the stacking policy dropped it.
    Applied(Option<EffectId>),
    /// The target's saving throw beat the DC.
    Resisted { roll: i32, dc: i32 },
}

impl EffectOutcome {
    pub fn landed(&self) -> bool {
        matches!(self, EffectOutcome::Applied(Some(_)))
    }
}

#[derive(Debug, Clone)]
pub struct EffectInstance {
    pub source: UnitId,
    pub target: UnitId,
    pub effect: AbilityEffect,
    target_tags: Vec<String>,
    pub save_bonus: i32,
    pub save_advantage: Reroll,
    pub heal_bonus: i32,
    pub heal_advantage: Reroll,
}

impl EffectInstance {
    /// Prepare `effect` at `rank` for delivery from `source` to `target`.
    pub fn new(
        enc: &Encounter,
        source: UnitId,
        target: UnitId,
        mut effect: AbilityEffect,
        rank: Rank,
    ) -> Result<Self, CombatError> {
        enc.unit(source)?;
        let target_tags = enc.unit(target)?.tags.clone();
        effect.original_rank = rank;
        effect.rank = rank;
        effect.rank_read();

        Ok(Self {
            source,
            target,
            effect,
            target_tags,
            save_bonus: 0,
            save_advantage: Reroll::No,
            heal_bonus: 0,
            heal_advantage: Reroll::No,
        })
    }

    pub fn resolve(&mut self, enc: &mut Encounter) -> Result<EffectOutcome, CombatError> {
        enc.search(self.target, Timing::OnAttackTarget, hook(self))?;
        enc.search(self.source, Timing::OnAttackSource, hook(self))?;

        if let Some(save) = self.effect.saving_throw() {
            let roll = self.roll_save(enc, save)?;
            if roll > save.dc {
                debug!(target = %self.target, effect = %self.effect.name, roll, dc = save.dc, "effect resisted");
                enc.emit(CombatEvent::EffectResisted {
                    unit: self.target,
                    effect: self.effect.display_name(),
                    roll,
                    dc: save.dc,
                });
                return Ok(EffectOutcome::Resisted { roll, dc: save.dc });
            }
        }

        enc.search(self.target, Timing::OnHitTarget, hook(self))?;
        enc.search(self.source, Timing::OnHitSource, hook(self))?;

        let effect = self.effect.clone();
        let id = enc.add_effect(self.target, effect, Some(self.source), hook(self))?;
        Ok(EffectOutcome::Applied(id))
    }

    fn roll_save(&self, enc: &mut Encounter, save: SavingThrow) -> Result<i32, CombatError> {
        let bonus = self.save_bonus + enc.stat(self.target, save.stat)?;
        enc.basic_roll(self.target, bonus, self.save_advantage)
    }

    /// Turn-boundary saving throw for a filed save-ends effect. Returns true
    /// when the owner shakes it off.
    pub fn saving_throw(enc: &mut Encounter, effect: &AbilityEffect) -> Result<bool, CombatError> {
        let (Some(owner), Some(save)) = (effect.target, effect.saving_throw()) else {
            return Ok(false);
        };
        let source = effect.source.unwrap_or(owner);
        let mut instance = EffectInstance::new(enc, source, owner, effect.clone(), effect.rank)?;
        enc.search(owner, Timing::OnAttackSource, hook(&mut instance))?;

        let roll = instance.roll_save(enc, save)?;
        debug!(unit = %owner, effect = %effect.name, roll, dc = save.dc, "save-ends roll");
        Ok(roll > save.dc)
    }
}

impl AbilityInstance for EffectInstance {
    fn kind(&self) -> InstanceKind {
        InstanceKind::Effect
    }

    fn source(&self) -> UnitId {
        self.source
    }

    fn target(&self) -> UnitId {
        self.target
    }

    fn rank(&self) -> Rank {
        self.effect.rank
    }

    fn target_tags(&self) -> &[String] {
        &self.target_tags
    }

    fn heal_bonus(&self) -> i32 {
        self.heal_bonus
    }

    fn heal_advantage(&self) -> Reroll {
        self.heal_advantage
    }

    fn add_heal_bonus(&mut self, amount: i32) {
        self.heal_bonus += amount;
    }

    fn add_save_bonus(&mut self, amount: i32) {
        self.save_bonus += amount;
    }

    fn change_heal_advantage(&mut self, reroll: Reroll) {
        self.heal_advantage = self.heal_advantage.combine(reroll);
    }

    fn change_save_advantage(&mut self, reroll: Reroll) {
        self.save_advantage = self.save_advantage.combine(reroll);
    }
}

//! Active skills a unit can use on its turn.

use crate::effects::{AbilityEffect, EffectKind};
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::CombatEvent;
use crate::instance::effect::{EffectInstance, EffectOutcome};
use crate::world::{Rank, TargetType, UnitId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use tracing::{debug, info};

/// How much of a turn an action consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
pub enum ActionType {
    Free,
    #[default]
    Single,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, Display)]
pub enum SkillKind {
    Charisma,
    Instinct,
    #[strum(to_string = "Mana Burst")]
    ManaBurst,
    #[strum(to_string = "Mana Burst (Flame)")]
    ManaBurstFlame,
    Shapeshift,
    Stalking,
}

impl SkillKind {
    /// The status this skill grants.
    pub fn effect_kind(self) -> EffectKind {
        match self {
            SkillKind::Charisma => EffectKind::Charisma,
            SkillKind::Instinct => EffectKind::Instinct,
            SkillKind::ManaBurst => EffectKind::ManaBurst,
            SkillKind::ManaBurstFlame => EffectKind::ManaBurstFlame,
            SkillKind::Shapeshift => EffectKind::Shapeshift,
            SkillKind::Stalking => EffectKind::Stalking,
        }
    }

    pub fn default_target(self) -> TargetType {
        match self {
            SkillKind::Charisma => TargetType::Friendly,
            SkillKind::Stalking => TargetType::Hostile,
            _ => TargetType::Myself,
        }
    }
}

/// A ranked skill with a per-turn use limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub kind: SkillKind,
    pub rank: Rank,
    pub action: ActionType,
    pub max_uses: i32,
    #[serde(default)]
    pub current_uses: i32,
    pub target_type: TargetType,
}

impl Ability {
    pub fn new(kind: SkillKind, rank: Rank) -> Self {
        Self {
            kind,
            rank,
            action: ActionType::Single,
            max_uses: 1,
            current_uses: 0,
            target_type: kind.default_target(),
        }
    }

    pub fn with_action(mut self, action: ActionType) -> Self {
        self.action = action;
        self
    }

    pub fn with_max_uses(mut self, uses: i32) -> Self {
        self.max_uses = uses;
        self
    }

    pub fn name(&self) -> String {
        self.kind.to_string()
    }

    pub fn mp_cost(&self) -> i32 {
        self.rank.pick(&[2, 4, 6, 8, 10, 10], 0)
    }

    /// Whether the use limit and action type would allow a use right now.
    pub fn can_use(&self, actions: i32, max_actions: i32) -> bool {
        if self.action == ActionType::Full && actions != max_actions {
            return false;
        }
        self.current_uses < self.max_uses
    }

    /// Record a use if [`Ability::can_use`] passes.
    pub fn check_uses(&mut self, actions: i32, max_actions: i32) -> bool {
        if !self.can_use(actions, max_actions) {
            return false;
        }
        self.current_uses += 1;
        true
    }

    /// The status this ability grants, authored at its rank.
    pub fn effect(&self) -> AbilityEffect {
        AbilityEffect::new(self.kind.effect_kind(), self.rank)
    }
}

/// What a use of an ability did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityOutcome {
    /// No ability at that index.
    Skipped,
    /// The use limit or action type blocked it.
    Unavailable,
    /// The user could not pay the cost.
    Refused { cost: i32 },
    Activated(Vec<EffectOutcome>),
}

impl Encounter {
    /// Use the ability at `index` in the user's list.
    ///
    /// Charisma goes to the supplied allies (the user when none are given),
    /// Stalking marks the first supplied target, every other skill lands on
    /// the user.
    pub fn use_ability(
        &mut self,
        user: UnitId,
        index: usize,
        targets: &[UnitId],
    ) -> Result<AbilityOutcome, CombatError> {
        self.ensure_not_over()?;
        self.ensure_alive(user)?;
        let (ability, actions, max_actions) = {
            let unit = self.unit(user)?;
            match unit.abilities.get(index) {
                Some(ability) => (ability.clone(), unit.actions, unit.max_actions),
                None => {
                    debug!(unit = %user, index, "no ability at index");
                    return Ok(AbilityOutcome::Skipped);
                }
            }
        };

        let recipients: Vec<UnitId> = match ability.kind {
            SkillKind::Stalking => match targets.first() {
                Some(&target) => vec![target],
                None => return Err(CombatError::TargetRequired(ability.name())),
            },
            SkillKind::Charisma if !targets.is_empty() => targets.to_vec(),
            _ => vec![user],
        };

        if !ability.can_use(actions, max_actions) {
            return Ok(AbilityOutcome::Unavailable);
        }

        let cost = ability.mp_cost();
        if !self.spend_mana(user, cost)? {
            info!(unit = %user, ability = %ability.name(), cost, "ability refused");
            self.emit(CombatEvent::CastRefused {
                unit: user,
                name: ability.name(),
                cost,
            });
            return Ok(AbilityOutcome::Refused { cost });
        }
        if let Some(slot) = self.unit_mut(user)?.abilities.get_mut(index) {
            slot.check_uses(actions, max_actions);
        }

        let mut outcomes = Vec::with_capacity(recipients.len());
        for target in recipients {
            if !self.unit(target)?.is_alive() {
                continue;
            }
            let mut instance =
                EffectInstance::new(self, user, target, ability.effect(), ability.rank)?;
            outcomes.push(instance.resolve(self)?);
        }

        self.spend_action(user, ability.action)?;
        Ok(AbilityOutcome::Activated(outcomes))
    }

    /// End the status an ability granted to its user.
    ///
    /// Stalking lives on its target and has no deactivation path.
    pub fn deactivate_ability(&mut self, user: UnitId, index: usize) -> Result<bool, CombatError> {
        let Some(ability) = self.unit(user)?.abilities.get(index).cloned() else {
            return Ok(false);
        };
        if ability.kind == SkillKind::Stalking {
            unimplemented!("Stalking cannot be deactivated");
        }
        let kind = ability.kind.effect_kind();
        let filed: Vec<_> = self
            .unit(user)?
            .effects
            .iter()
            .filter(|e| std::mem::discriminant(&e.kind) == std::mem::discriminant(&kind))
            .map(|e| e.id)
            .collect();
        let mut removed = false;
        for id in filed {
            removed |= self.remove_effect(user, id)?;
        }
        Ok(removed)
    }
}

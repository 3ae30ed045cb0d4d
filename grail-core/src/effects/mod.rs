//! Effects and the per-unit effect registry.
//!
//! An [`AbilityEffect`] is a status, passive or triggered effect attached to
//! a unit. Its behaviour lives in its [`EffectKind`], which declares the
//! [`Timing`]s it hooks into. The registry files effects by class; the
//! encounter fires their hooks through [`Encounter::search`].

pub mod triggers;

pub use triggers::EffectKind;

use crate::dice::Dice;
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::CombatEvent;
use crate::instance::effect::EffectInstance;
use crate::instance::{reborrow, AbilityInstance};
use crate::params::Stat;
use crate::world::{EffectId, Rank, UnitId};
use serde::{Deserialize, Serialize};
use std::mem;
use strum::{Display, EnumIter};
use tracing::debug;

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum EffectClass {
    Status,
    Passive,
    Triggered,
}

/// How long an effect stays filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Duration {
    /// Fires on equip and is never filed.
    Instant,
    /// Purged when the effect's source starts its next turn.
    SourceNextTurn,
    /// Removed when the owner starts its next turn.
    TargetNextTurn,
    /// Removed when the owner starts its next turn.
    StartNextTurn,
    /// Saving throw at the start of each of the owner's turns.
    StartSaveEnds,
    /// Saving throw at the end of each of the owner's turns.
    EndSaveEnds,
    /// Counts down at the start of each of the owner's turns.
    TurnCount,
    Infinite,
}

/// Points in combat at which effect hooks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, Display)]
pub enum Timing {
    OnEquip,
    OnUnequip,
    RoundStart,
    RoundEnd,
    TurnStart,
    TurnEnd,
    OnAttackSource,
    OnAttackTarget,
    OnHitSource,
    OnHitTarget,
    OnDamageSource,
    OnDamageTarget,
}

impl Timing {
    /// Timings that only make sense while an ability instance resolves.
    pub fn needs_instance(&self) -> bool {
        matches!(
            self,
            Timing::OnAttackSource
                | Timing::OnAttackTarget
                | Timing::OnHitSource
                | Timing::OnHitTarget
                | Timing::OnDamageSource
                | Timing::OnDamageTarget
        )
    }
}

/// What to do when a non-stackable effect lands on a unit that already has
/// one of the same kind and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackPolicy {
    /// Remove the old effect, then equip the new one.
    #[default]
    Replace,
    /// Replace only when the new rank is at least the old rank.
    KeepStrongest,
    /// Keep the old effect and drop the new one.
    RejectNew,
}

// ============================================================================
// Effects
// ============================================================================

/// A saving throw declared by an effect: beat `dc` with a basic roll plus
/// the target's `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingThrow {
    pub stat: Stat,
    pub dc: i32,
}

/// An effect, either authored (unbound) or applied to a unit (bound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityEffect {
    #[serde(default)]
    pub id: EffectId,
    pub kind: EffectKind,
    pub name: String,
    pub class: EffectClass,
    pub duration: Duration,
    pub original_rank: Rank,
    pub rank: Rank,
    #[serde(default)]
    pub turn_count: i32,
    #[serde(default)]
    pub stackable: bool,
    /// Stat used for the saving throw, if the effect allows one.
    #[serde(default)]
    pub save: Option<Stat>,
    #[serde(default)]
    pub dc: i32,
    #[serde(default)]
    pub bonus: i32,
    #[serde(default)]
    pub penalty: i32,
    #[serde(default)]
    pub dice: Dice,
    #[serde(default)]
    pub source: Option<UnitId>,
    #[serde(default)]
    pub target: Option<UnitId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AbilityEffect {
    /// Author an effect of the given kind at a rank, with the kind's default
    /// class, duration and rank-derived values.
    pub fn new(kind: EffectKind, rank: Rank) -> Self {
        let (class, duration) = kind.classification();
        let mut effect = Self {
            id: EffectId::new(),
            name: kind.default_name().to_string(),
            class,
            duration,
            original_rank: rank,
            rank,
            turn_count: 0,
            stackable: false,
            save: kind.save_stat(),
            dc: 0,
            bonus: 0,
            penalty: 0,
            dice: Dice::NONE,
            source: None,
            target: None,
            tags: Vec::new(),
            kind,
        };
        effect.rank_read();
        effect
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_class(mut self, class: EffectClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_save(mut self, stat: Stat) -> Self {
        self.save = Some(stat);
        self
    }

    pub fn with_turn_count(mut self, turns: i32) -> Self {
        self.turn_count = turns;
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }

    /// Refresh bonus, DC and dice from the current rank. Kinds without a
    /// rank table keep their authored values.
    pub fn rank_read(&mut self) {
        if let Some(values) = self.kind.rank_values(self.rank) {
            self.bonus = values.bonus;
            self.dc = values.dc;
            self.dice = values.dice;
        }
    }

    /// Attach to a target and source, resetting the current rank to the
    /// original one.
    pub fn bind(&mut self, target: UnitId, source: UnitId) {
        self.id = EffectId::new();
        self.target = Some(target);
        self.source = Some(source);
        self.rank = self.original_rank;
        self.rank_read();
    }

    pub fn saving_throw(&self) -> Option<SavingThrow> {
        self.save.map(|stat| SavingThrow { stat, dc: self.dc })
    }

    /// Whether two effects count as the same for stacking purposes.
    pub fn same_as(&self, other: &AbilityEffect) -> bool {
        mem::discriminant(&self.kind) == mem::discriminant(&other.kind) && self.name == other.name
    }

    pub fn display_name(&self) -> String {
        format!("{} [{}]", self.name, self.rank)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The effects filed on one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectRegistry {
    status: Vec<AbilityEffect>,
    passive: Vec<AbilityEffect>,
    triggered: Vec<AbilityEffect>,
    charisma: bool,
}

impl EffectRegistry {
    pub fn list(&self, class: EffectClass) -> &[AbilityEffect] {
        match class {
            EffectClass::Status => &self.status,
            EffectClass::Passive => &self.passive,
            EffectClass::Triggered => &self.triggered,
        }
    }

    fn list_mut(&mut self, class: EffectClass) -> &mut Vec<AbilityEffect> {
        match class {
            EffectClass::Status => &mut self.status,
            EffectClass::Passive => &mut self.passive,
            EffectClass::Triggered => &mut self.triggered,
        }
    }

    /// File an effect under its class.
    pub fn insert(&mut self, effect: AbilityEffect) {
        self.list_mut(effect.class).push(effect);
    }

    pub fn remove(&mut self, id: EffectId) -> Option<AbilityEffect> {
        for list in [&mut self.status, &mut self.passive, &mut self.triggered] {
            if let Some(pos) = list.iter().position(|e| e.id == id) {
                return Some(list.remove(pos));
            }
        }
        None
    }

    pub fn get(&self, id: EffectId) -> Option<&AbilityEffect> {
        self.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EffectId) -> Option<&mut AbilityEffect> {
        self.status
            .iter_mut()
            .chain(self.passive.iter_mut())
            .chain(self.triggered.iter_mut())
            .find(|e| e.id == id)
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.get(id).is_some()
    }

    /// Status, then passive, then triggered effects.
    pub fn iter(&self) -> impl Iterator<Item = &AbilityEffect> {
        self.status
            .iter()
            .chain(self.passive.iter())
            .chain(self.triggered.iter())
    }

    /// An already-filed effect that `effect` would stack with.
    pub fn find_duplicate(&self, effect: &AbilityEffect) -> Option<&AbilityEffect> {
        self.iter().find(|e| e.same_as(effect))
    }

    pub fn has_charisma(&self) -> bool {
        self.charisma
    }

    pub fn set_charisma(&mut self, active: bool) {
        self.charisma = active;
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|e| e.display_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.status.len() + self.passive.len() + self.triggered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Encounter operations
// ============================================================================

impl Encounter {
    /// Apply an effect to a unit.
    ///
    /// Binds the effect (source defaults to the unit itself), resolves the
    /// stacking policy for non-stackable effects, fires OnEquip with the
    /// given instance and files the effect unless it is Instant. Returns
    /// `None` when the stacking policy rejected the effect.
    pub fn add_effect(
        &mut self,
        unit: UnitId,
        mut effect: AbilityEffect,
        source: Option<UnitId>,
        instance: Option<&mut dyn AbilityInstance>,
    ) -> Result<Option<EffectId>, CombatError> {
        let source = source.unwrap_or(unit);
        effect.bind(unit, source);
        if effect.duration == Duration::TurnCount {
            effect.turn_count = effect
                .kind
                .roll_turn_count(effect.turn_count, self.rng.as_mut());
        }

        if !effect.stackable {
            let existing = self
                .unit(unit)?
                .effects
                .find_duplicate(&effect)
                .map(|e| (e.id, e.rank));
            if let Some((old_id, old_rank)) = existing {
                let replace = match self.config.stack_policy {
                    StackPolicy::Replace => true,
                    StackPolicy::KeepStrongest => effect.rank >= old_rank,
                    StackPolicy::RejectNew => false,
                };
                if !replace {
                    debug!(unit = %unit, effect = %effect.name, "duplicate effect rejected");
                    return Ok(None);
                }
                self.remove_effect(unit, old_id)?;
            }
        }

        let id = effect.id;
        let name = effect.display_name();
        effect.kind.fire(self, &effect, Timing::OnEquip, instance)?;
        if effect.duration != Duration::Instant {
            self.unit_mut(unit)?.effects.insert(effect);
        }

        debug!(unit = %unit, effect = %name, "effect applied");
        self.emit(CombatEvent::EffectApplied {
            unit,
            effect: name,
            source,
        });
        Ok(Some(id))
    }

    /// Fire OnUnequip for a filed effect, then remove it. Returns false when
    /// the unit has no such effect.
    pub fn remove_effect(&mut self, unit: UnitId, id: EffectId) -> Result<bool, CombatError> {
        let Some(effect) = self.unit(unit)?.effects.get(id).cloned() else {
            return Ok(false);
        };
        effect.kind.fire(self, &effect, Timing::OnUnequip, None)?;
        if self.unit_mut(unit)?.effects.remove(id).is_none() {
            return Ok(false);
        }

        debug!(unit = %unit, effect = %effect.name, "effect removed");
        self.emit(CombatEvent::EffectRemoved {
            unit,
            effect: effect.display_name(),
        });
        Ok(true)
    }

    /// Fire every hook a unit's effects declare for `timing`: status,
    /// passive and triggered effects, then main-hand, off-hand and armour
    /// effects. Instance-scoped timings do nothing without an instance.
    pub fn search(
        &mut self,
        unit: UnitId,
        timing: Timing,
        mut instance: Option<&mut dyn AbilityInstance>,
    ) -> Result<(), CombatError> {
        if timing.needs_instance() && instance.is_none() {
            return Ok(());
        }

        let matching: Vec<AbilityEffect> = {
            let owner = self.unit(unit)?;
            owner
                .effects
                .iter()
                .chain(owner.equipment.effects())
                .filter(|e| e.kind.has_hook(timing))
                .cloned()
                .collect()
        };

        for effect in matching {
            // An earlier hook may have removed it.
            if !self.unit(unit)?.has_effect(effect.id) {
                continue;
            }
            effect
                .kind
                .fire(self, &effect, timing, reborrow(&mut instance))?;
        }
        Ok(())
    }

    /// Start-of-turn cleanup for the unit whose turn begins.
    pub fn clean_start_of_turn(&mut self, unit: UnitId) -> Result<(), CombatError> {
        let filed: Vec<AbilityEffect> = self.unit(unit)?.effects.iter().cloned().collect();
        for effect in filed {
            if !self.unit(unit)?.effects.contains(effect.id) {
                continue;
            }
            match effect.duration {
                Duration::TargetNextTurn | Duration::StartNextTurn => {
                    self.remove_effect(unit, effect.id)?;
                }
                Duration::StartSaveEnds => {
                    if EffectInstance::saving_throw(self, &effect)? {
                        self.remove_effect(unit, effect.id)?;
                    }
                }
                Duration::TurnCount => {
                    let expired = match self.unit_mut(unit)?.effects.get_mut(effect.id) {
                        Some(filed) => {
                            filed.turn_count -= 1;
                            filed.turn_count <= 0
                        }
                        None => false,
                    };
                    if expired {
                        self.remove_effect(unit, effect.id)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// End-of-turn cleanup: save-ends effects get their saving throw.
    pub fn clean_end_of_turn(&mut self, unit: UnitId) -> Result<(), CombatError> {
        let filed: Vec<AbilityEffect> = self
            .unit(unit)?
            .effects
            .iter()
            .filter(|e| e.duration == Duration::EndSaveEnds)
            .cloned()
            .collect();
        for effect in filed {
            if !self.unit(unit)?.effects.contains(effect.id) {
                continue;
            }
            if EffectInstance::saving_throw(self, &effect)? {
                self.remove_effect(unit, effect.id)?;
            }
        }
        Ok(())
    }

    /// Purge SourceNextTurn effects that `source` placed on every other
    /// living unit.
    pub fn clean_effects_by_source(&mut self, source: UnitId) -> Result<(), CombatError> {
        let doomed: Vec<(UnitId, EffectId)> = self
            .units
            .iter()
            .filter(|u| u.alive && u.id != source)
            .flat_map(|u| {
                u.effects
                    .iter()
                    .filter(|e| {
                        e.duration == Duration::SourceNextTurn && e.source == Some(source)
                    })
                    .map(move |e| (u.id, e.id))
            })
            .collect();
        for (unit, id) in doomed {
            self.remove_effect(unit, id)?;
        }
        Ok(())
    }
}

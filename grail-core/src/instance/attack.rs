//! Weapon attacks.

use super::{hits, hook, reduced_damage, AbilityInstance, InstanceKind};
use crate::dice::{Reroll, CRIT_THRESHOLD};
use crate::effects::Timing;
use crate::encounter::Encounter;
use crate::error::CombatError;
use crate::events::CombatEvent;
use crate::params::Stat;
use crate::world::{Rank, UnitId, Weapon};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of one attack instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub target: UnitId,
    pub weapon: Option<String>,
    pub roll: i32,
    pub evasion: i32,
    pub hit: bool,
    pub critical: bool,
    /// Damage that got through armour, if any.
    pub damage: Option<i32>,
}

/// One swing of one weapon (or a bare fist) at one target.
#[derive(Debug, Clone)]
pub struct AttackInstance {
    pub source: UnitId,
    pub target: UnitId,
    pub weapon: Option<Weapon>,
    pub ranged: bool,
    target_tags: Vec<String>,
    pub attack: i32,
    pub evasion: i32,
    pub crit_threat: i32,
    pub armour: i32,
    pub damage_bonus: i32,
    pub attack_advantage: Reroll,
    pub crit_advantage: Reroll,
    pub damage_advantage: Reroll,
}

impl AttackInstance {
    /// Prepare an attack. No weapon means an unarmed melee attack rolled at
    /// disadvantage.
    pub fn new(
        enc: &Encounter,
        source: UnitId,
        target: UnitId,
        weapon: Option<Weapon>,
    ) -> Result<Self, CombatError> {
        enc.unit(source)?;
        let target_tags = enc.unit(target)?.tags.clone();
        let ranged = weapon.as_ref().is_some_and(Weapon::is_ranged);
        let attack_advantage = if weapon.is_none() {
            Reroll::Disadvantage
        } else {
            Reroll::No
        };

        Ok(Self {
            source,
            target,
            weapon,
            ranged,
            target_tags,
            attack: 0,
            evasion: 0,
            crit_threat: 0,
            armour: 0,
            damage_bonus: 0,
            attack_advantage,
            crit_advantage: Reroll::No,
            damage_advantage: Reroll::No,
        })
    }

    pub fn resolve(&mut self, enc: &mut Encounter) -> Result<AttackOutcome, CombatError> {
        let attack_stat = if self.ranged {
            Stat::Ranged
        } else {
            Stat::Melee
        };
        self.attack = enc.stat(self.source, attack_stat)?;
        self.evasion = enc.stat(self.target, Stat::Evasion)?;
        enc.search(self.source, Timing::OnAttackSource, hook(self))?;
        enc.search(self.target, Timing::OnAttackTarget, hook(self))?;

        let roll = enc.basic_roll(self.source, self.attack, self.attack_advantage)?;
        if !hits(roll, self.evasion) {
            debug!(source = %self.source, target = %self.target, roll, evasion = self.evasion, "attack missed");
            return Ok(self.report(enc, roll, false, false, None));
        }

        self.crit_threat = enc.stat(self.source, Stat::CritThreat)?;
        self.armour = enc.stat(self.target, Stat::Armour)?;
        enc.search(self.source, Timing::OnHitSource, hook(self))?;
        enc.search(self.target, Timing::OnHitTarget, hook(self))?;

        let crit_roll = enc.basic_roll(self.source, self.crit_threat, self.crit_advantage)?;
        let critical = crit_roll >= CRIT_THRESHOLD;

        let dice = match &self.weapon {
            Some(weapon) => weapon.damage_dice(),
            None => enc.config().unarmed_dice,
        };
        let mut damage = enc.custom_roll(
            self.source,
            dice,
            self.damage_bonus,
            self.damage_advantage,
        )?;
        if critical {
            damage *= 2;
        }

        let dealt = reduced_damage(damage, self.armour);
        debug!(
            source = %self.source,
            target = %self.target,
            roll,
            damage,
            armour = self.armour,
            critical,
            "attack hit"
        );
        let outcome = self.report(enc, roll, true, critical, dealt);
        if let Some(amount) = dealt {
            enc.damage_unit(self.target, amount)?;
            enc.search(self.source, Timing::OnDamageSource, hook(self))?;
            enc.search(self.target, Timing::OnDamageTarget, hook(self))?;
        }
        Ok(outcome)
    }

    fn report(
        &self,
        enc: &mut Encounter,
        roll: i32,
        hit: bool,
        critical: bool,
        damage: Option<i32>,
    ) -> AttackOutcome {
        let weapon = self.weapon.as_ref().map(|w| w.name.clone());
        enc.emit(CombatEvent::AttackResolved {
            source: self.source,
            target: self.target,
            weapon: weapon.clone(),
            roll,
            evasion: self.evasion,
            hit,
            critical,
            damage,
        });
        AttackOutcome {
            target: self.target,
            weapon,
            roll,
            evasion: self.evasion,
            hit,
            critical,
            damage,
        }
    }
}

impl AbilityInstance for AttackInstance {
    fn kind(&self) -> InstanceKind {
        InstanceKind::Attack
    }

    fn source(&self) -> UnitId {
        self.source
    }

    fn target(&self) -> UnitId {
        self.target
    }

    fn rank(&self) -> Rank {
        self.weapon.as_ref().map(|w| w.rank).unwrap_or_default()
    }

    fn weapon_tags(&self) -> &[String] {
        match &self.weapon {
            Some(weapon) => &weapon.tags,
            None => &[],
        }
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

    fn change_crit_advantage(&mut self, reroll: Reroll) {
        self.crit_advantage = self.crit_advantage.combine(reroll);
    }

    fn change_damage_advantage(&mut self, reroll: Reroll) {
        self.damage_advantage = self.damage_advantage.combine(reroll);
    }
}

// ============================================================================
// Attack action
// ============================================================================

impl Encounter {
    /// Attack with everything in hand: the main hand, then a distinct off
    /// hand, or one unarmed blow when both are empty. Stops early if the
    /// target falls, then spends one action.
    pub fn attack(
        &mut self,
        source: UnitId,
        target: UnitId,
    ) -> Result<Vec<AttackOutcome>, CombatError> {
        self.ensure_not_over()?;
        self.ensure_alive(source)?;
        self.ensure_alive(target)?;

        let weapons = self.unit(source)?.equipment.attack_weapons();
        let mut outcomes = Vec::with_capacity(weapons.len());
        for weapon in weapons {
            if !self.unit(target)?.is_alive() {
                break;
            }
            let mut instance = AttackInstance::new(self, source, target, weapon)?;
            outcomes.push(instance.resolve(self)?);
        }

        self.reduce_action_count(source, 1)?;
        Ok(outcomes)
    }
}

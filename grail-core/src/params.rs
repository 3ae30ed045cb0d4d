//! Unit parameters and the dependency graph between them.
//!
//! Every unit carries a [`ParameterGraph`]: a set of named integer stats,
//! some of which are derived from others through a [`Formula`]. Changing a
//! stat synchronously re-evaluates everything that depends on it, in the
//! order the dependents subscribed.
//!
//! A stat's value is the sum of two parts: the flat modifier accumulated by
//! [`ParameterGraph::sum`]/[`ParameterGraph::subtract`] and the value its
//! formula last produced. Re-evaluation zeroes the stat and re-sums its
//! formula, so a flat bonus on a derived stat lasts only until a stat it
//! derives from changes.
//!
//! Formulas must stay acyclic. [`ParameterGraph::subscribe`] refuses any
//! edge that would close a loop.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use strum::{Display, EnumIter, IntoEnumIterator};
use thiserror::Error;
use tracing::warn;

/// Errors from parameter graph operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("Subscribing {dependent} to {input} would create a cycle")]
    Cycle { dependent: Stat, input: Stat },

    #[error("Unknown parameter: {0}")]
    Unknown(Stat),
}

// ============================================================================
// Stats
// ============================================================================

/// Every stat a unit can carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    Display,
)]
pub enum Stat {
    // Base
    Strength,
    Endurance,
    Agility,
    Mana,
    Luck,
    Will,
    // Derived
    Movement,
    Armour,
    #[strum(to_string = "MP Generation")]
    MpGeneration,
    #[strum(to_string = "Crit Threat")]
    CritThreat,
    Evasion,
    Resistance,
    // Attack
    Melee,
    Ranged,
    Spellcraft,
}

impl Stat {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Stat::Strength => "STR",
            Stat::Endurance => "END",
            Stat::Agility => "AGL",
            Stat::Mana => "MAN",
            Stat::Luck => "LCK",
            Stat::Will => "WLL",
            Stat::Movement => "MOV",
            Stat::Armour => "ARM",
            Stat::MpGeneration => "MPG",
            Stat::CritThreat => "CRT",
            Stat::Evasion => "EVA",
            Stat::Resistance => "RES",
            Stat::Melee => "MEL",
            Stat::Ranged => "RNG",
            Stat::Spellcraft => "SPC",
        }
    }

    /// Whether this is one of the six base stats.
    pub fn is_base(&self) -> bool {
        matches!(
            self,
            Stat::Strength
                | Stat::Endurance
                | Stat::Agility
                | Stat::Mana
                | Stat::Luck
                | Stat::Will
        )
    }
}

/// A bulk set of stat deltas, as carried by items and servants.
pub type StatBlock = BTreeMap<Stat, i32>;

// ============================================================================
// Formulas
// ============================================================================

/// How a derived stat is computed from other stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formula {
    /// `base + offset`
    Offset { base: Stat, offset: i32 },
    /// `floor(base * numerator / denominator)`
    Scaled {
        base: Stat,
        numerator: i32,
        denominator: i32,
    },
    /// The value of another stat.
    Copy(Stat),
    /// The sum of several stats.
    Sum(Vec<Stat>),
}

impl Formula {
    pub fn evaluate(&self, graph: &ParameterGraph) -> i32 {
        match self {
            Formula::Offset { base, offset } => graph.get(*base) + offset,
            Formula::Scaled {
                base,
                numerator,
                denominator,
            } => {
                if *denominator == 0 {
                    return 0;
                }
                (graph.get(*base) * numerator).div_euclid(*denominator)
            }
            Formula::Copy(stat) => graph.get(*stat),
            Formula::Sum(stats) => stats.iter().map(|s| graph.get(*s)).sum(),
        }
    }

    /// The stats this formula reads.
    pub fn references(&self) -> Vec<Stat> {
        match self {
            Formula::Offset { base, .. } | Formula::Scaled { base, .. } => vec![*base],
            Formula::Copy(stat) => vec![*stat],
            Formula::Sum(stats) => stats.clone(),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Offset { base, offset } if *offset < 0 => {
                write!(f, "{} - {}", base.abbreviation(), -offset)
            }
            Formula::Offset { base, offset } => write!(f, "{} + {}", base.abbreviation(), offset),
            Formula::Scaled {
                base,
                numerator,
                denominator,
            } => write!(f, "{} x {}/{}", base.abbreviation(), numerator, denominator),
            Formula::Copy(stat) => write!(f, "{}", stat.abbreviation()),
            Formula::Sum(stats) => {
                let names: Vec<&str> = stats.iter().map(|s| s.abbreviation()).collect();
                write!(f, "{}", names.join(" + "))
            }
        }
    }
}

/// A stat definition: the stat plus its formula, if derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub stat: Stat,
    pub formula: Option<Formula>,
}

impl Parameter {
    pub fn plain(stat: Stat) -> Self {
        Self {
            stat,
            formula: None,
        }
    }

    pub fn derived(stat: Stat, formula: Formula) -> Self {
        Self {
            stat,
            formula: Some(formula),
        }
    }
}

/// The parameter set every unit starts with.
///
/// Movement = STR + 5, Evasion = 10 + AGL, Crit Threat = floor(LCK / 2),
/// MP Generation = MAN, Resistance = END. Armour has no formula; armour
/// pieces and effects sum into it directly.
pub fn standard_parameters() -> Vec<Parameter> {
    Stat::iter()
        .map(|stat| match stat {
            Stat::Movement => Parameter::derived(
                stat,
                Formula::Offset {
                    base: Stat::Strength,
                    offset: 5,
                },
            ),
            Stat::Evasion => Parameter::derived(
                stat,
                Formula::Offset {
                    base: Stat::Agility,
                    offset: 10,
                },
            ),
            Stat::CritThreat => Parameter::derived(
                stat,
                Formula::Scaled {
                    base: Stat::Luck,
                    numerator: 1,
                    denominator: 2,
                },
            ),
            Stat::MpGeneration => Parameter::derived(stat, Formula::Copy(Stat::Mana)),
            Stat::Resistance => Parameter::derived(stat, Formula::Copy(Stat::Endurance)),
            _ => Parameter::plain(stat),
        })
        .collect()
}

// ============================================================================
// Graph
// ============================================================================

/// One stat node in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRef {
    pub stat: Stat,
    /// Flat contributions from sum/subtract since the last evaluation.
    pub modifier: i32,
    /// Value last produced by the formula.
    pub derived: i32,
    pub formula: Option<Formula>,
    /// Stats to re-evaluate when this one changes, in subscription order.
    pub dependents: Vec<Stat>,
}

impl ParameterRef {
    fn new(stat: Stat) -> Self {
        Self {
            stat,
            modifier: 0,
            derived: 0,
            formula: None,
            dependents: Vec::new(),
        }
    }

    pub fn value(&self) -> i32 {
        self.modifier + self.derived
    }
}

/// A value-changed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub stat: Stat,
    pub old: i32,
    pub new: i32,
}

/// A unit's stats and the subscriptions between them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterGraph {
    refs: Vec<ParameterRef>,
    #[serde(skip)]
    changes: Vec<ParameterChange>,
}

impl ParameterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from definitions. Formulas are not wired until
    /// [`ParameterGraph::init_formulas`] runs.
    pub fn with_parameters(parameters: impl IntoIterator<Item = Parameter>) -> Self {
        let mut graph = Self::new();
        for parameter in parameters {
            graph.define(parameter);
        }
        graph
    }

    /// The standard parameter set with its formulas wired and evaluated.
    pub fn standard() -> Self {
        let mut graph = Self::with_parameters(standard_parameters());
        if let Err(err) = graph.init_formulas() {
            warn!(%err, "standard formulas rejected");
        }
        graph.changes.clear();
        graph
    }

    fn position(&self, stat: Stat) -> Option<usize> {
        self.refs.iter().position(|r| r.stat == stat)
    }

    fn ensure(&mut self, stat: Stat) -> usize {
        match self.position(stat) {
            Some(idx) => idx,
            None => {
                self.refs.push(ParameterRef::new(stat));
                self.refs.len() - 1
            }
        }
    }

    /// Add a stat definition, replacing the formula of an existing one.
    pub fn define(&mut self, parameter: Parameter) {
        let idx = self.ensure(parameter.stat);
        self.refs[idx].formula = parameter.formula;
    }

    pub fn contains(&self, stat: Stat) -> bool {
        self.position(stat).is_some()
    }

    /// Current value of a stat, 0 when absent.
    pub fn get(&self, stat: Stat) -> i32 {
        self.position(stat)
            .map(|idx| self.refs[idx].value())
            .unwrap_or(0)
    }

    pub fn formula(&self, stat: Stat) -> Option<&Formula> {
        self.position(stat)
            .and_then(|idx| self.refs[idx].formula.as_ref())
    }

    pub fn dependents(&self, stat: Stat) -> &[Stat] {
        match self.position(stat) {
            Some(idx) => &self.refs[idx].dependents,
            None => &[],
        }
    }

    /// Iterate stats and their values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Stat, i32)> + '_ {
        self.refs.iter().map(|r| (r.stat, r.value()))
    }

    /// Add `delta` to a stat, creating it when absent.
    pub fn sum(&mut self, stat: Stat, delta: i32) {
        let idx = self.ensure(stat);
        let old = self.refs[idx].value();
        self.refs[idx].modifier += delta;
        self.record(idx, old);
        self.propagate(stat);
    }

    /// Subtract `delta` from a stat. Absent stats are left alone.
    pub fn subtract(&mut self, stat: Stat, delta: i32) {
        let Some(idx) = self.position(stat) else {
            return;
        };
        let old = self.refs[idx].value();
        self.refs[idx].modifier -= delta;
        self.record(idx, old);
        self.propagate(stat);
    }

    pub fn sum_all(&mut self, block: &StatBlock) {
        for (stat, delta) in block {
            self.sum(*stat, *delta);
        }
    }

    pub fn subtract_all(&mut self, block: &StatBlock) {
        for (stat, delta) in block {
            self.subtract(*stat, *delta);
        }
    }

    /// Register `dependent` to be re-evaluated whenever `source` changes.
    pub fn subscribe(&mut self, dependent: Stat, source: Stat) -> Result<(), ParameterError> {
        if dependent == source || self.reaches(dependent, source) {
            return Err(ParameterError::Cycle {
                dependent,
                input: source,
            });
        }
        self.ensure(dependent);
        let idx = self.ensure(source);
        if !self.refs[idx].dependents.contains(&dependent) {
            self.refs[idx].dependents.push(dependent);
        }
        Ok(())
    }

    /// Whether `to` is reachable from `from` along dependent edges.
    fn reaches(&self, from: Stat, to: Stat) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(stat) = stack.pop() {
            if stat == to {
                return true;
            }
            if seen.insert(stat) {
                stack.extend(self.dependents(stat).iter().copied());
            }
        }
        false
    }

    /// Wire every formula to the stats it reads and evaluate it.
    pub fn init_formulas(&mut self) -> Result<(), ParameterError> {
        let formulas: Vec<(Stat, Formula)> = self
            .refs
            .iter()
            .filter_map(|r| r.formula.clone().map(|f| (r.stat, f)))
            .collect();

        for (stat, formula) in formulas {
            for source in formula.references() {
                self.subscribe(stat, source)?;
            }
            self.reevaluate(stat);
        }
        Ok(())
    }

    /// Zero a stat and re-sum its formula's output. Flat contributions
    /// made since the last evaluation are discarded.
    pub fn recalculate(&mut self, stat: Stat) -> Result<(), ParameterError> {
        if !self.contains(stat) {
            return Err(ParameterError::Unknown(stat));
        }
        self.reevaluate(stat);
        Ok(())
    }

    fn reevaluate(&mut self, stat: Stat) {
        let Some(idx) = self.position(stat) else {
            return;
        };
        let old = self.refs[idx].value();
        let derived = match &self.refs[idx].formula {
            Some(formula) => formula.evaluate(self),
            None => 0,
        };
        self.refs[idx].modifier = 0;
        self.refs[idx].derived = derived;
        self.record(idx, old);
        self.propagate(stat);
    }

    fn propagate(&mut self, stat: Stat) {
        let dependents = self.dependents(stat).to_vec();
        for dependent in dependents {
            self.reevaluate(dependent);
        }
    }

    fn record(&mut self, idx: usize, old: i32) {
        let new = self.refs[idx].value();
        if new != old {
            self.changes.push(ParameterChange {
                stat: self.refs[idx].stat,
                old,
                new,
            });
        }
    }

    /// Take the value-changed notifications recorded since the last drain.
    pub fn drain_changes(&mut self) -> Vec<ParameterChange> {
        std::mem::take(&mut self.changes)
    }

    /// Display text for a stat, e.g. `"Movement: 8 (STR + 5)"`.
    pub fn text(&self, stat: Stat) -> String {
        match self.formula(stat) {
            Some(formula) => format!("{}: {} ({})", stat, self.get(stat), formula),
            None => format!("{}: {}", stat, self.get(stat)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_formulas() {
        let mut graph = ParameterGraph::standard();
        assert_eq!(graph.get(Stat::Movement), 5);
        assert_eq!(graph.get(Stat::Evasion), 10);
        assert_eq!(graph.get(Stat::CritThreat), 0);

        graph.sum(Stat::Strength, 3);
        assert_eq!(graph.get(Stat::Movement), 8);

        graph.sum(Stat::Luck, 5);
        assert_eq!(graph.get(Stat::CritThreat), 2);

        graph.sum(Stat::Mana, 4);
        graph.sum(Stat::Endurance, 2);
        assert_eq!(graph.get(Stat::MpGeneration), 4);
        assert_eq!(graph.get(Stat::Resistance), 2);
    }

    #[test]
    fn test_scaled_floors_negative_values() {
        let mut graph = ParameterGraph::standard();
        graph.subtract(Stat::Luck, 3);
        assert_eq!(graph.get(Stat::CritThreat), -2);
    }

    #[test]
    fn test_get_absent_is_zero() {
        let graph = ParameterGraph::new();
        assert_eq!(graph.get(Stat::Will), 0);
        assert!(!graph.contains(Stat::Will));
    }

    #[test]
    fn test_subtract_absent_is_noop() {
        let mut graph = ParameterGraph::new();
        graph.subtract(Stat::Strength, 4);
        assert!(!graph.contains(Stat::Strength));
        assert!(graph.drain_changes().is_empty());
    }

    #[test]
    fn test_sum_creates_missing() {
        let mut graph = ParameterGraph::new();
        graph.sum(Stat::Armour, 2);
        assert_eq!(graph.get(Stat::Armour), 2);
    }

    #[test]
    fn test_subscribe_rejects_cycles() {
        let mut graph = ParameterGraph::new();
        graph.subscribe(Stat::Movement, Stat::Strength).unwrap();
        graph.subscribe(Stat::Evasion, Stat::Movement).unwrap();

        assert_eq!(
            graph.subscribe(Stat::Strength, Stat::Evasion),
            Err(ParameterError::Cycle {
                dependent: Stat::Strength,
                input: Stat::Evasion
            })
        );
        assert!(graph.subscribe(Stat::Luck, Stat::Luck).is_err());
    }

    #[test]
    fn test_subscribe_ignores_duplicates() {
        let mut graph = ParameterGraph::new();
        graph.subscribe(Stat::Movement, Stat::Strength).unwrap();
        graph.subscribe(Stat::Evasion, Stat::Strength).unwrap();
        graph.subscribe(Stat::Movement, Stat::Strength).unwrap();
        assert_eq!(
            graph.dependents(Stat::Strength),
            &[Stat::Movement, Stat::Evasion]
        );
        assert_eq!(graph.get(Stat::Strength), 0);
    }

    #[test]
    fn test_recalculation_wipes_flat_bonus() {
        let mut graph = ParameterGraph::standard();
        graph.sum(Stat::Evasion, 3);
        assert_eq!(graph.get(Stat::Evasion), 13);

        graph.sum(Stat::Agility, 1);
        assert_eq!(graph.get(Stat::Evasion), 11);

        graph.sum(Stat::Evasion, 2);
        graph.recalculate(Stat::Evasion).unwrap();
        assert_eq!(graph.get(Stat::Evasion), 11);
    }

    #[test]
    fn test_chained_formulas() {
        let mut graph = ParameterGraph::with_parameters(vec![
            Parameter::plain(Stat::Strength),
            Parameter::derived(
                Stat::Movement,
                Formula::Offset {
                    base: Stat::Strength,
                    offset: 5,
                },
            ),
            Parameter::derived(Stat::Melee, Formula::Sum(vec![Stat::Movement, Stat::Luck])),
        ]);
        graph.init_formulas().unwrap();
        assert_eq!(graph.get(Stat::Melee), 5);

        graph.sum(Stat::Strength, 2);
        assert_eq!(graph.get(Stat::Melee), 7);
        graph.sum(Stat::Luck, 1);
        assert_eq!(graph.get(Stat::Melee), 8);
    }

    #[test]
    fn test_drain_changes() {
        let mut graph = ParameterGraph::standard();
        assert!(graph.drain_changes().is_empty());

        graph.sum(Stat::Strength, 3);
        let changes = graph.drain_changes();
        assert_eq!(
            changes,
            vec![
                ParameterChange {
                    stat: Stat::Strength,
                    old: 0,
                    new: 3
                },
                ParameterChange {
                    stat: Stat::Movement,
                    old: 5,
                    new: 8
                },
            ]
        );
        assert!(graph.drain_changes().is_empty());
    }

    #[test]
    fn test_recalculate_unknown() {
        let mut graph = ParameterGraph::new();
        assert_eq!(
            graph.recalculate(Stat::Evasion),
            Err(ParameterError::Unknown(Stat::Evasion))
        );
    }

    #[test]
    fn test_bulk_sum() {
        let mut graph = ParameterGraph::standard();
        let block: StatBlock = [(Stat::Strength, 2), (Stat::Agility, 3)].into_iter().collect();
        graph.sum_all(&block);
        assert_eq!(graph.get(Stat::Movement), 7);
        assert_eq!(graph.get(Stat::Evasion), 13);

        graph.subtract_all(&block);
        assert_eq!(graph.get(Stat::Movement), 5);
        assert_eq!(graph.get(Stat::Evasion), 10);
    }

    #[test]
    fn test_text() {
        let mut graph = ParameterGraph::standard();
        graph.sum(Stat::Strength, 3);
        assert_eq!(graph.text(Stat::Movement), "Movement: 8 (STR + 5)");
        assert_eq!(graph.text(Stat::Strength), "Strength: 3");
        assert_eq!(graph.text(Stat::CritThreat), "Crit Threat: 0 (LCK x 1/2)");
    }
}

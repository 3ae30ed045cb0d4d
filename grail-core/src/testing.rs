//! Testing utilities for the combat core.
//!
//! This module provides tools for deterministic tests:
//! - `ScriptedDice` for queueing exact die faces
//! - `TestHarness` for building encounters around scripted dice
//! - Assertion helpers for verifying unit state

use crate::dice::RandomSource;
use crate::encounter::{Encounter, EncounterConfig};
use crate::events::CombatEvent;
use crate::world::{create_sample_unit, Team, UnitId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Once;

/// Face returned once the queue runs dry.
pub const FALLBACK_FACE: u32 = 1;

/// A random source that returns queued faces in order.
///
/// Faces larger than the die are clamped to its sides. When the queue is
/// empty every die shows [`FALLBACK_FACE`].
pub struct ScriptedDice {
    faces: Rc<RefCell<VecDeque<u32>>>,
}

/// Handle for queueing faces after the dice have been handed to an
/// encounter.
#[derive(Clone)]
pub struct DiceHandle {
    faces: Rc<RefCell<VecDeque<u32>>>,
}

impl ScriptedDice {
    /// Create scripted dice and the handle that feeds them.
    pub fn new() -> (Self, DiceHandle) {
        let faces = Rc::new(RefCell::new(VecDeque::new()));
        (
            Self {
                faces: Rc::clone(&faces),
            },
            DiceHandle { faces },
        )
    }
}

impl RandomSource for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        let face = self.faces.borrow_mut().pop_front().unwrap_or(FALLBACK_FACE);
        face.clamp(1, sides)
    }
}

impl DiceHandle {
    /// Append faces to the queue.
    pub fn queue(&self, faces: &[u32]) {
        self.faces.borrow_mut().extend(faces.iter().copied());
    }

    /// Faces still waiting to be rolled.
    pub fn remaining(&self) -> usize {
        self.faces.borrow().len()
    }

    pub fn clear(&self) {
        self.faces.borrow_mut().clear();
    }
}

/// Test harness for running combat scenarios.
pub struct TestHarness {
    /// The encounter under test.
    pub encounter: Encounter,
    /// Feeds the encounter's dice.
    pub dice: DiceHandle,
}

impl TestHarness {
    /// Create an empty encounter with scripted dice.
    pub fn new() -> Self {
        Self::with_config(EncounterConfig::new("Test Encounter"))
    }

    pub fn with_config(config: EncounterConfig) -> Self {
        let (dice, handle) = ScriptedDice::new();
        let encounter = Encounter::with_random_source(config, Box::new(dice));
        Self {
            encounter,
            dice: handle,
        }
    }

    /// Spawn a plain standard unit.
    pub fn spawn_sample(&mut self, name: &str, team: Team) -> UnitId {
        self.encounter.spawn(create_sample_unit(name, team))
    }

    /// Get a unit's HP as (current, max).
    pub fn hp(&self, unit: UnitId) -> (i32, i32) {
        match self.encounter.unit(unit) {
            Ok(u) => (u.hp, u.max_hp),
            Err(_) => (0, 0),
        }
    }

    /// Count undrained events matching a predicate.
    pub fn count_events(&self, predicate: impl Fn(&CombatEvent) -> bool) -> usize {
        self.encounter.events().filter(|e| predicate(*e)).count()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a `RUST_LOG`-driven subscriber for test output. Safe to call from
/// every test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert a unit's HP.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, unit: UnitId, current: i32) {
    let (actual, max) = harness.hp(unit);
    assert_eq!(
        actual, current,
        "Expected {unit} at {current}/{max} HP, got {actual}/{max}"
    );
}

/// Assert a unit is down.
#[track_caller]
pub fn assert_dead(harness: &TestHarness, unit: UnitId) {
    let alive = harness
        .encounter
        .unit(unit)
        .map(|u| u.is_alive())
        .unwrap_or(false);
    assert!(!alive, "Expected {unit} to be dead");
}

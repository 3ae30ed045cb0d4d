//! Dice rolling system.
//!
//! Every roll in the game is either a basic roll (3d6 plus a bonus) or a
//! custom roll (NdS plus a bonus). Both honour a reroll flag: advantage rolls
//! the whole pool twice and keeps the higher total, disadvantage keeps the
//! lower one.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(i32),
    #[error("Too many dice: {count} (at most {max})")]
    TooManyDice { count: i32, max: i32 },
    #[error("No dice specified")]
    NoDice,
}

/// Largest pool accepted from notation.
pub const MAX_DICE: i32 = 100;

/// Largest die accepted from notation.
pub const MAX_SIDES: i32 = 1000;

/// Reroll state for a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Reroll {
    Disadvantage,
    #[default]
    No,
    Advantage,
}

impl Reroll {
    /// Combine two reroll requests (advantage + disadvantage = no reroll).
    pub fn combine(self, other: Reroll) -> Reroll {
        match (self, other) {
            (Reroll::No, x) | (x, Reroll::No) => x,
            (Reroll::Advantage, Reroll::Advantage) => Reroll::Advantage,
            (Reroll::Disadvantage, Reroll::Disadvantage) => Reroll::Disadvantage,
            (Reroll::Advantage, Reroll::Disadvantage) => Reroll::No,
            (Reroll::Disadvantage, Reroll::Advantage) => Reroll::No,
        }
    }
}

/// Source of die faces.
///
/// The encounter owns one of these; nothing in the crate reaches for a global
/// RNG, so a seeded or scripted source makes every combat reproducible.
pub trait RandomSource {
    /// Roll a single die, returning a value in `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Seeded game RNG backed by ChaCha8.
#[derive(Debug, Clone)]
pub struct GameRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl GameRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create a new RNG with a random seed.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// The seed this RNG was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for GameRng {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.rng.gen_range(1..=sides)
    }
}

/// A pool of identical dice, e.g. `2d6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dice {
    pub count: i32,
    pub sides: i32,
}

/// The pool behind every basic roll.
pub const BASIC_DICE: Dice = Dice::new(3, 6);

/// A crit roll at or above this lands a critical hit.
pub const CRIT_THRESHOLD: i32 = 20;

impl Dice {
    /// An empty pool. Rolling it always yields 0.
    pub const NONE: Dice = Dice::new(0, 0);

    pub const fn new(count: i32, sides: i32) -> Self {
        Self { count, sides }
    }

    /// Whether the pool can be rolled at all.
    pub fn is_rollable(&self) -> bool {
        self.count > 0 && self.sides > 0
    }

    pub fn min(&self) -> i32 {
        if self.is_rollable() {
            self.count
        } else {
            0
        }
    }

    pub fn max(&self) -> i32 {
        if self.is_rollable() {
            self.count.saturating_mul(self.sides)
        } else {
            0
        }
    }

    /// Roll the pool once and sum the faces.
    pub fn roll(&self, rng: &mut dyn RandomSource) -> i32 {
        if !self.is_rollable() {
            return 0;
        }
        (0..self.count)
            .map(|_| rng.roll_die(self.sides as u32) as i32)
            .fold(0, i32::saturating_add)
    }

    /// Parse `NdS` notation (`"2d6"`, `"d8"`).
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let d_pos = notation
            .find('d')
            .ok_or_else(|| DiceError::InvalidNotation(notation.clone()))?;
        let count_str = &notation[..d_pos];
        let sides_str = &notation[d_pos + 1..];

        let count: i32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.clone()))?
        };
        let sides: i32 = sides_str
            .parse()
            .map_err(|_| DiceError::InvalidNotation(notation.clone()))?;

        if count < 0 || sides < 0 {
            return Err(DiceError::InvalidNotation(notation));
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice {
                count,
                max: MAX_DICE,
            });
        }
        if sides > MAX_SIDES {
            return Err(DiceError::InvalidDieSize(sides));
        }

        Ok(Dice::new(count, sides))
    }
}

impl FromStr for Dice {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dice::parse(s)
    }
}

impl TryFrom<String> for Dice {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Dice::parse(&value)
    }
}

impl From<Dice> for String {
    fn from(dice: Dice) -> Self {
        dice.to_string()
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

fn roll_pool(rng: &mut dyn RandomSource, dice: Dice, reroll: Reroll) -> i32 {
    match reroll {
        Reroll::No => dice.roll(rng),
        Reroll::Advantage => {
            let first = dice.roll(rng);
            let second = dice.roll(rng);
            first.max(second)
        }
        Reroll::Disadvantage => {
            let first = dice.roll(rng);
            let second = dice.roll(rng);
            first.min(second)
        }
    }
}

/// 3d6 + bonus, honouring the reroll flag.
pub fn basic_roll(rng: &mut dyn RandomSource, bonus: i32, reroll: Reroll) -> i32 {
    roll_pool(rng, BASIC_DICE, reroll) + bonus
}

/// NdS + bonus, honouring the reroll flag.
///
/// An empty pool (N ≤ 0 or S ≤ 0) yields 0 and the bonus is not applied.
pub fn custom_roll(rng: &mut dyn RandomSource, dice: Dice, bonus: i32, reroll: Reroll) -> i32 {
    if !dice.is_rollable() {
        return 0;
    }
    roll_pool(rng, dice, reroll) + bonus
}

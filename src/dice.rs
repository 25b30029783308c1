use std::fmt;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::FormulaError;

/// Source of die results.
pub trait DiceRoller: Send + Sync {
    /// Roll one die with `faces` sides, returning a value in `1..=faces`.
    fn roll_die(&self, faces: u32) -> i64;

    /// Roll `count` dice with `faces` sides and sum them.
    fn roll(&self, count: u32, faces: u32) -> i64 {
        (0..count).map(|_| self.roll_die(faces)).sum()
    }

    /// Parse and evaluate a dice/arithmetic formula such as `"1d20 + 4"`.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError`] if the formula is malformed or cannot be evaluated.
    fn evaluate_formula(&self, formula: &str) -> Result<f64, FormulaError> {
        let expr = crate::parse::parse_formula(formula)?;
        crate::resolve::eval_formula(&expr, self)
    }
}

/// Thread-local RNG dice.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngRoller;

impl DiceRoller for ThreadRngRoller {
    fn roll_die(&self, faces: u32) -> i64 {
        i64::from(rand::thread_rng().gen_range(1..=faces.max(1)))
    }
}

/// Reproducible dice from a seeded [`StdRng`].
pub struct SeededRoller {
    rng: Mutex<StdRng>,
}

impl SeededRoller {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DiceRoller for SeededRoller {
    fn roll_die(&self, faces: u32) -> i64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        i64::from(rng.gen_range(1..=faces.max(1)))
    }
}

impl fmt::Debug for SeededRoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRoller").finish_non_exhaustive()
    }
}

/// Every die shows the same face, clamped to the die's range.
#[derive(Debug, Clone, Copy)]
pub struct FixedRoller {
    face: u32,
}

impl FixedRoller {
    #[must_use]
    pub fn new(face: u32) -> Self {
        Self { face }
    }
}

impl DiceRoller for FixedRoller {
    fn roll_die(&self, faces: u32) -> i64 {
        i64::from(self.face.clamp(1, faces.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_rng_in_range() {
        let roller = ThreadRngRoller;
        for _ in 0..100 {
            let v = roller.roll_die(20);
            assert!((1..=20).contains(&v), "value {v} out of range");
        }
    }

    #[test]
    fn seeded_is_reproducible() {
        let a = SeededRoller::new(7);
        let b = SeededRoller::new(7);
        let xs: Vec<i64> = (0..10).map(|_| a.roll_die(20)).collect();
        let ys: Vec<i64> = (0..10).map(|_| b.roll_die(20)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn fixed_clamps_to_die() {
        let roller = FixedRoller::new(10);
        assert_eq!(roller.roll_die(20), 10);
        assert_eq!(roller.roll_die(6), 6);
        assert_eq!(FixedRoller::new(0).roll_die(6), 1);
        assert_eq!(roller.roll(3, 6), 18);
    }

    #[test]
    fn evaluate_formula_with_dice() {
        let roller = FixedRoller::new(3);
        assert_eq!(roller.evaluate_formula("2d6 + 1"), Ok(7.0));
        assert_eq!(roller.evaluate_formula("1d20 + 4"), Ok(7.0));
    }

    #[test]
    fn evaluate_formula_rejects_garbage() {
        assert!(FixedRoller::new(1).evaluate_formula("2d").is_err());
    }
}

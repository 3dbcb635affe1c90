//! Time and randomness the evaluator borrows from the outside world.
//!
//! Both are traits so a caller can pin them down: lifetimes read the clock at
//! declaration and at every lookup, and `maybe` flips a coin whenever its
//! truthiness is needed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::SystemTime;

pub trait Clock {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

pub trait Coin {
    fn flip(&mut self) -> bool;
}

/// Always lands the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedCoin(pub bool);

impl Coin for FixedCoin {
    fn flip(&mut self) -> bool {
        self.0
    }
}

/// Fair coin over a seedable generator.
#[derive(Debug, Clone)]
pub struct RandomCoin {
    rng: StdRng,
}

impl RandomCoin {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Same seed, same sequence of flips.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomCoin {
    fn default() -> Self {
        Self::new()
    }
}

impl Coin for RandomCoin {
    fn flip(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }
}

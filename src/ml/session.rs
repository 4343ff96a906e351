// ============================================================
// Layer 5 — Numeric Session
// ============================================================
// The device and random state for one training run, owned by
// the trainer and lent to every component that needs them.
// Tests build one Session per case, so no state leaks between
// them.

use burn::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

pub struct Session<B: Backend> {
    device: B::Device,
    rng:    StdRng,
    seed:   u64,
}

impl<B: Backend> Session<B> {
    /// Seeds both the backend's tensor RNG (weight init, dropout)
    /// and the host RNG (shuffling, augmentation).
    pub fn new(device: B::Device, seed: u64) -> Self {
        B::seed(seed);
        Self { device, rng: StdRng::seed_from_u64(seed), seed }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

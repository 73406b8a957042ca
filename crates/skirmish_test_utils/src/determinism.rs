//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Lockstep play and replays need the simulation to be 100%
//! deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: positions are whole pixels and flight paths
//!   interpolate with [`skirmish_core::math::SubPixel`].
//!
//! - **HashMap iteration order**: units and missiles live in slot-ordered
//!   vectors; hash maps are only used for name lookups.
//!
//! - **System randomness**: every roll comes from the seeded synchronized
//!   stream in the world.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual controllers and order phases
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use skirmish_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use skirmish_test_utils::determinism::verify_determinism;
/// use skirmish_test_utils::fixtures::economy;
///
/// let result = verify_determinism(
///     3,
///     50,
///     || economy(7),
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run two simulations from the same setup and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Verify that a serialize round trip mid-game changes nothing: the
/// restored copy hashes equal at once and after `num_ticks` more ticks.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..num_ticks {
        sim.tick();
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..num_ticks {
        sim.tick();
        restored.tick();
    }
    restored.state_hash() == sim.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::math::{PixelPos, TilePos};
    use skirmish_core::missile::MissileClass;

    /// A pixel inside a 64 by 64 tile map.
    pub fn arb_pixel() -> impl Strategy<Value = PixelPos> {
        (0i32..2048, 0i32..2048).prop_map(|(x, y)| PixelPos::new(x, y))
    }

    /// A tile inside a `width` by `height` map.
    pub fn arb_tile(width: i32, height: i32) -> impl Strategy<Value = TilePos> {
        (0..width, 0..height).prop_map(|(x, y)| TilePos::new(x, y))
    }

    /// Missile speed in pixels per step.
    pub fn arb_speed() -> impl Strategy<Value = i32> {
        1i32..64
    }

    /// Hit damage before splash.
    pub fn arb_damage() -> impl Strategy<Value = i32> {
        1i32..500
    }

    /// Missile classes that fly from source to destination.
    pub fn arb_flying_class() -> impl Strategy<Value = MissileClass> {
        prop_oneof![
            Just(MissileClass::PointToPoint),
            Just(MissileClass::PointToPointWithHit),
            Just(MissileClass::PointToPointCycleOnce),
            Just(MissileClass::PointToPointBounce),
            Just(MissileClass::Parabolic),
        ]
    }

    /// Simulation seeds.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{battle, economy, run_battle};
    use proptest::prelude::*;

    #[test]
    fn test_economy_is_deterministic() {
        verify_determinism(3, 300, || economy(42), |s| { s.tick(); }, Simulation::state_hash)
            .assert_deterministic();
    }

    #[test]
    fn test_battle_with_volleys_is_deterministic() {
        verify_determinism(
            3,
            1,
            || battle(42),
            |s| run_battle(s, 240, 20),
            Simulation::state_hash,
        )
        .assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(|| economy(3), 200), None);
    }

    #[test]
    fn test_parallel_economy_simulations() {
        run_parallel_simulations(|| economy(11), 4, 200).assert_deterministic();
    }

    #[test]
    fn test_serialization_mid_game() {
        assert!(verify_serialization_determinism(|| economy(5), 120));
        assert!(verify_serialization_determinism(
            || {
                let mut sim = battle(5);
                run_battle(&mut sim, 30, 10);
                sim
            },
            40
        ));
    }

    #[test]
    fn test_different_seeds_may_differ_but_each_is_stable() {
        for seed in [1, 2, 3] {
            assert!(verify_simulation_determinism(|| battle(seed), 120));
        }
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_any_seed_is_deterministic(seed in strategies::arb_seed()) {
            let result = verify_determinism(
                2,
                1,
                || battle(seed),
                |s| run_battle(s, 90, 15),
                Simulation::state_hash,
            );
            prop_assert!(result.is_deterministic);
        }
    }
}

//! Seeded RNG construction with ChaCha8.
//!
//! The generator and the throttle share one stream derived from the run
//! seed. Same seed -> same events, always.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Create the deterministic RNG for a run seed.
pub fn source_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Seed used when the caller did not pick one: wall-clock millis mixed with
/// the process id, never zero.
pub fn fresh_seed() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    (millis ^ (u64::from(std::process::id()) << 32)).max(1)
}

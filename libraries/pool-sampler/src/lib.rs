//! Uniform random sampling of a question pool down to a session size.
//!
//! This library reduces a pool of items to at most a target count with a
//! uniform shuffle followed by truncation. Every subset of the requested size
//! is equally likely, and so is every ordering of the kept items — the order
//! questions appear in a session comes straight from here.
//!
//! The rng is a parameter rather than a hidden `thread_rng()` so callers that
//! need reproducibility (tests, simulations) can pass a seeded generator.
//!
//! # Example
//!
//! ```
//! use pool_sampler::shuffle_take;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let pool = vec!["q1", "q2", "q3", "q4", "q5"];
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! let session = shuffle_take(pool, 3, &mut rng);
//! assert_eq!(session.len(), 3);
//! ```

use rand::Rng;
use rand::seq::SliceRandom;

/// Shuffle `items` uniformly (Fisher–Yates) and keep at most `count` of them.
///
/// If the pool holds fewer than `count` items, the whole pool is returned in
/// shuffled order — asking for more than exists is not an error.
pub fn shuffle_take<T, R: Rng>(mut items: Vec<T>, count: usize, rng: &mut R) -> Vec<T> {
    items.shuffle(rng);
    items.truncate(count);
    items
}

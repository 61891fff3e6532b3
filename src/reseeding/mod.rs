//! Seeding the platform pseudo-random generator.
//!
//! Hardware draws are slow, so bulk randomness comes from a ChaCha20
//! generator that is seeded once from an [`EntropySource`].
//!
//! [`EntropySource`]: crate::entropy::EntropySource

mod system_rng;

pub use system_rng::{seed_system_rng, SystemRng};

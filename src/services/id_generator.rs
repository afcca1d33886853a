//! Short random paste identifiers.

use crate::models::paste::extension_of;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

/// Alphabet ids are drawn from.
pub const ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates fixed-length ids from [`ID_CHARSET`].
///
/// The random source is seeded once and shared by every clone, so one
/// generator built at startup can be handed to all repositories.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    rng: Arc<Mutex<StdRng>>,
    length: usize,
}

impl IdGenerator {
    /// Seed from the current time.
    pub fn new(length: usize) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_seed(length, seed)
    }

    pub fn with_seed(length: usize, seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            length,
        }
    }

    /// A fresh id. Uniqueness is the caller's concern.
    pub fn new_id(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..self.length)
            .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
            .collect()
    }

    /// A fresh id suffixed with the extension of `filename`, if any.
    pub fn new_key(&self, filename: Option<&str>) -> String {
        let mut key = self.new_id();
        if let Some(name) = filename {
            key.push_str(&extension_of(name));
        }
        key
    }
}

//! Worker-owned payload cache

use crate::config::Encoding;
use crate::traits::{Payload, PayloadError, PayloadGenerator};
use std::collections::HashMap;
use std::sync::Arc;

/// Caches generated payloads per `(size, encoding)`
///
/// Each worker owns one cache for its whole lifetime. A hit looks the entry
/// up by borrowed key and hands out a shared clone, so repeated writes of the
/// same size never allocate.
pub struct PayloadCache {
    generator: Arc<dyn PayloadGenerator>,
    entries: HashMap<Encoding, HashMap<usize, Payload>>,
    hits: u64,
    misses: u64,
}

impl PayloadCache {
    /// Create an empty cache backed by `generator`
    pub fn new(generator: Arc<dyn PayloadGenerator>) -> Self {
        Self {
            generator,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Get the payload for `(size, encoding)`, generating it on first use
    pub fn get(&mut self, size: usize, encoding: &Encoding) -> Result<Payload, PayloadError> {
        if let Some(payload) = self.entries.get(encoding).and_then(|by_size| by_size.get(&size)) {
            self.hits += 1;
            return Ok(payload.clone());
        }

        let payload = self.generator.generate(size, encoding)?;
        if payload.len() != size {
            return Err(PayloadError::Generation(format!(
                "generator `{}` returned {} bytes, expected {}",
                self.generator.name(),
                payload.len(),
                size
            )));
        }

        self.misses += 1;
        self.entries
            .entry(encoding.clone())
            .or_default()
            .insert(size, payload.clone());
        Ok(payload)
    }

    /// Number of lookups served from the cache
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of lookups that invoked the generator
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of cached payloads
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the backing generator
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }
}

impl std::fmt::Debug for PayloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCache")
            .field("generator", &self.generator.name())
            .field("entries", &self.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

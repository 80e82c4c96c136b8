//! Built-in payload generators

use bytes::Bytes;
use thunder_core::{Encoding, Payload, PayloadError, PayloadGenerator};

/// Bytes repeated by [`StaticGenerator`] for text payloads.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Pattern used when `pattern` is selected without one.
pub const DEFAULT_PATTERN: &str = "thunder ";

/// Fixed-content generator.
///
/// Text payloads cycle through a lowercase alphanumeric alphabet so they are
/// readable in a packet capture; binary payloads are all zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticGenerator;

impl StaticGenerator {
    /// Create a new static generator.
    pub fn new() -> Self {
        Self
    }
}

impl PayloadGenerator for StaticGenerator {
    fn name(&self) -> &str {
        "static"
    }

    fn generate(&self, size: usize, encoding: &Encoding) -> Result<Payload, PayloadError> {
        match encoding {
            Encoding::Text => {
                let data: Vec<u8> = ALPHABET.iter().copied().cycle().take(size).collect();
                Ok(Payload::text(data))
            }
            Encoding::Binary => Ok(Payload::binary(vec![0u8; size])),
            Encoding::Custom(name) => Err(PayloadError::UnsupportedEncoding(name.clone())),
        }
    }
}

/// Repeats a user supplied pattern to the requested size.
///
/// Binary payloads are cut at the exact byte count. Text payloads never split
/// a multi-byte character: the tail is padded with spaces instead.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    pattern: Bytes,
}

impl PatternGenerator {
    /// Create a generator for `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is empty.
    pub fn new(pattern: &str) -> Result<Self, PayloadError> {
        if pattern.is_empty() {
            return Err(PayloadError::Generation("pattern must not be empty".into()));
        }
        Ok(Self {
            pattern: Bytes::copy_from_slice(pattern.as_bytes()),
        })
    }

    /// The repeated pattern.
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    fn repeat(&self, size: usize) -> Vec<u8> {
        self.pattern.iter().copied().cycle().take(size).collect()
    }
}

impl Default for PatternGenerator {
    fn default() -> Self {
        Self {
            pattern: Bytes::from_static(DEFAULT_PATTERN.as_bytes()),
        }
    }
}

impl PayloadGenerator for PatternGenerator {
    fn name(&self) -> &str {
        "pattern"
    }

    fn generate(&self, size: usize, encoding: &Encoding) -> Result<Payload, PayloadError> {
        match encoding {
            Encoding::Text => {
                let mut data = self.repeat(size);
                let valid = match std::str::from_utf8(&data) {
                    Ok(_) => size,
                    Err(err) => err.valid_up_to(),
                };
                data[valid..].fill(b' ');
                Ok(Payload::text(data))
            }
            Encoding::Binary => Ok(Payload::binary(self.repeat(size))),
            Encoding::Custom(name) => Err(PayloadError::UnsupportedEncoding(name.clone())),
        }
    }
}

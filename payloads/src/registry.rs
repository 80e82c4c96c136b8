//! Generator selection
//!
//! Maps generator identifiers from configuration onto concrete
//! [`PayloadGenerator`] implementations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use thunder_core::PayloadGenerator;

use crate::generators::{PatternGenerator, StaticGenerator};

/// Registry lookup error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The identifier does not name a known generator.
    #[error("unknown generator: {0}")]
    UnknownGenerator(String),
}

/// Enumeration of built-in payload generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GeneratorKind {
    /// Fixed alphabet or zeros
    #[default]
    #[serde(rename = "static")]
    Static,
    /// Repeated user pattern
    #[serde(rename = "pattern")]
    Pattern,
}

impl GeneratorKind {
    /// Returns the display name for this generator.
    pub fn display_name(&self) -> &'static str {
        match self {
            GeneratorKind::Static => "Static",
            GeneratorKind::Pattern => "Pattern",
        }
    }

    /// Returns the identifier string for this generator.
    pub fn id(&self) -> &'static str {
        match self {
            GeneratorKind::Static => "static",
            GeneratorKind::Pattern => "pattern",
        }
    }

    /// Returns all built-in generators.
    pub fn all() -> &'static [GeneratorKind] {
        &[GeneratorKind::Static, GeneratorKind::Pattern]
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for GeneratorKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" | "default" | "fixed" => Ok(GeneratorKind::Static),
            "pattern" | "repeat" => Ok(GeneratorKind::Pattern),
            _ => Err(RegistryError::UnknownGenerator(s.to_string())),
        }
    }
}

/// Create the generator for `kind` with its default settings.
///
/// Use [`PatternGenerator::new`] directly for a custom pattern.
pub fn create_generator(kind: GeneratorKind) -> Arc<dyn PayloadGenerator> {
    tracing::debug!(generator = kind.id(), "creating payload generator");
    match kind {
        GeneratorKind::Static => Arc::new(StaticGenerator::new()),
        GeneratorKind::Pattern => Arc::new(PatternGenerator::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thunder_core::Encoding;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("static".parse::<GeneratorKind>(), Ok(GeneratorKind::Static));
        assert_eq!("FIXED".parse::<GeneratorKind>(), Ok(GeneratorKind::Static));
        assert_eq!(" pattern ".parse::<GeneratorKind>(), Ok(GeneratorKind::Pattern));
        assert_eq!(
            "random".parse::<GeneratorKind>(),
            Err(RegistryError::UnknownGenerator("random".into()))
        );
    }

    #[test]
    fn test_ids_round_trip() {
        for kind in GeneratorKind::all() {
            assert_eq!(kind.id().parse::<GeneratorKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_serde_uses_ids() {
        let json = serde_json::to_string(&GeneratorKind::Pattern).unwrap();
        assert_eq!(json, "\"pattern\"");
        let back: GeneratorKind = serde_json::from_str("\"static\"").unwrap();
        assert_eq!(back, GeneratorKind::Static);
    }

    #[test]
    fn test_create_generator_matches_kind() {
        for kind in GeneratorKind::all() {
            let generator = create_generator(*kind);
            assert_eq!(generator.name(), kind.id());
            assert_eq!(generator.generate(64, &Encoding::Text).unwrap().len(), 64);
        }
    }
}

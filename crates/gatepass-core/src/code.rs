//! Exit code generation and parsing.
//!
//! The exit code is the secret a customer presents at the gate (rendered as
//! a QR payload). It is high-entropy and drawn from an alphabet without
//! visually ambiguous characters so a fallback manual entry stays practical.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Prefix identifying exit codes on the wire.
pub const CODE_PREFIX: &str = "EX-";

/// Number of random characters after the prefix.
pub const CODE_LEN: usize = 16;

/// Alphabet excluding 0/O, 1/I/L and lowercase.
pub const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// The externally presented exit secret.
///
/// Never logged and never placed in event payloads; it travels only in the
/// issuance response and the scan request.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitCode(String);

impl ExitCode {
    /// Generate a fresh random code from the OS RNG.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let mut code = String::with_capacity(CODE_PREFIX.len() + CODE_LEN);
        code.push_str(CODE_PREFIX);
        for _ in 0..CODE_LEN {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            code.push(CODE_ALPHABET[idx] as char);
        }
        Self(code)
    }

    /// Parse a scanned string, validating shape and alphabet.
    ///
    /// Parse failure does not mean "unknown code" - it means the scanner
    /// handed us something that was never a code at all. Callers still
    /// treat both as `NotFound` at the authority level.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let body = s
            .strip_prefix(CODE_PREFIX)
            .ok_or_else(|| CoreError::MalformedCode(s.len()))?;
        if body.len() != CODE_LEN || !body.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
            return Err(CoreError::MalformedCode(s.len()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Debug intentionally redacts: codes must never reach logs.
impl fmt::Debug for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExitCode(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let code = ExitCode::generate();
        assert!(code.as_str().starts_with(CODE_PREFIX));
        assert_eq!(code.as_str().len(), CODE_PREFIX.len() + CODE_LEN);
    }

    #[test]
    fn test_generate_alphabet() {
        let code = ExitCode::generate();
        let body = &code.as_str()[CODE_PREFIX.len()..];
        assert!(body.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_generate_unique() {
        let a = ExitCode::generate();
        let b = ExitCode::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_roundtrip() {
        let code = ExitCode::generate();
        let parsed = ExitCode::parse(code.as_str()).unwrap();
        assert_eq!(code, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ExitCode::parse("").is_err());
        assert!(ExitCode::parse("EX-short").is_err());
        assert!(ExitCode::parse("XX-ABCDEFGHJKMNPQRS").is_err());
        // 0 and O are excluded from the alphabet
        assert!(ExitCode::parse("EX-0OOOOOOOOOOOOOOO").is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let code = ExitCode::generate();
        let debug = format!("{:?}", code);
        assert!(!debug.contains(&code.as_str()[CODE_PREFIX.len()..]));
    }
}

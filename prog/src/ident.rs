use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::ModelError;

/// Number of characters in a procedure identifier.
pub const IDENT_LEN: usize = 8;

/// Procedure identifier: exactly eight uppercase ASCII letters.
///
/// The editor uses the identifier to name the icon drawn for a procedure,
/// the text format uses it to refer to call targets and resume points.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident([u8; IDENT_LEN]);

impl Ident {
    /// Build an identifier from raw bytes, rejecting anything outside `A-Z`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; IDENT_LEN] = bytes.try_into().ok()?;
        if raw.iter().all(u8::is_ascii_uppercase) {
            Some(Ident(raw))
        } else {
            None
        }
    }

    /// Draw a uniformly random identifier. Uniqueness is the caller's job;
    /// see [`Module::generate_ident`](crate::Module::generate_ident).
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut raw = [b'A'; IDENT_LEN];
        for byte in raw.iter_mut() {
            *byte = b'A' + rng.gen_range(0..26u8);
        }
        Ident(raw)
    }

    pub fn as_bytes(&self) -> &[u8; IDENT_LEN] {
        &self.0
    }
}

impl FromStr for Ident {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ident::from_bytes(s.as_bytes()).ok_or_else(|| ModelError::InvalidIdent(s.to_string()))
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            write!(f, "{}", byte as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ident({})", self)
    }
}

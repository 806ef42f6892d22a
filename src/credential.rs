//! Shared-secret credential check.
//!
//! One deployment-wide token. Comparison ignores ASCII case and does not stop
//! at the first differing byte. An unset expected token rejects everything.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Invalid password")]
    Mismatch,
    #[error("Expected credential is not configured")]
    NotConfigured,
}

#[derive(Clone, Default)]
pub struct CredentialChecker {
    expected: Option<String>,
}

impl std::fmt::Debug for CredentialChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialChecker")
            .field("configured", &self.expected.is_some())
            .finish()
    }
}

impl CredentialChecker {
    pub fn new(expected: Option<String>) -> Self {
        Self { expected }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub fn check(&self, submitted: &str) -> Result<(), CredentialError> {
        let expected = self
            .expected
            .as_deref()
            .ok_or(CredentialError::NotConfigured)?;

        if eq_ignore_case(expected.as_bytes(), submitted.as_bytes()) {
            Ok(())
        } else {
            Err(CredentialError::Mismatch)
        }
    }
}

fn eq_ignore_case(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b)
        .fold(0u8, |acc, (x, y)| acc | (x.to_ascii_lowercase() ^ y.to_ascii_lowercase()))
        == 0
}

//! Password checks run before encoding. Policy only: the cipher accepts any
//! non-empty password.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use zipseal_core::{SealError, SealResult};

/// Strength score from 0 to 5: one point each for length >= 8, an uppercase
/// letter, a lowercase letter, a digit, and any other character.
pub fn password_score(password: &str) -> u8 {
    let checks = [
        password.chars().count() >= 8,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    checks.iter().filter(|&&ok| ok).count() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    VeryWeak,
    Weak,
    Fair,
    Strong,
    VeryStrong,
}

impl Strength {
    pub fn from_score(score: u8) -> Self {
        match score {
            0 | 1 => Strength::VeryWeak,
            2 => Strength::Weak,
            3 => Strength::Fair,
            4 => Strength::Strong,
            _ => Strength::VeryStrong,
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strength::VeryWeak => "very weak",
            Strength::Weak => "weak",
            Strength::Fair => "fair",
            Strength::Strong => "strong",
            Strength::VeryStrong => "very strong",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub min_score: u8,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            min_score: 3,
        }
    }
}

impl PasswordPolicy {
    /// A policy that only rejects empty or mismatched passwords.
    pub fn permissive() -> Self {
        Self {
            min_length: 1,
            min_score: 0,
        }
    }

    /// Validate a new password and its confirmation.
    pub fn check(
        &self,
        password: &SecretString,
        confirm: Option<&SecretString>,
    ) -> SealResult<Strength> {
        let pw = password.expose_secret();
        if pw.is_empty() {
            return Err(SealError::EmptyPassword);
        }
        if let Some(confirm) = confirm {
            if confirm.expose_secret() != pw {
                return Err(SealError::PasswordMismatch);
            }
        }

        let score = password_score(pw);
        if pw.chars().count() < self.min_length || score < self.min_score {
            return Err(SealError::WeakPassword {
                score,
                required: self.min_score,
            });
        }
        Ok(Strength::from_score(score))
    }
}

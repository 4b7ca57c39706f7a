//! Password strength policy.
//!
//! The service only asks the policy for messages; what counts as a strong
//! password is up to the [`PasswordPolicy`] implementation wired into the
//! application state.

use std::collections::HashMap;

use serde::Deserialize;

/// Values a password must not resemble.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAttributes<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
}

pub trait PasswordPolicy: Send + Sync {
    /// Returns one message per violated rule; an empty list accepts the password.
    fn check(&self, password: &str, attributes: UserAttributes<'_>) -> Vec<String>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordPolicyConfig {
    pub min_length: usize,
    /// Reject passwords too similar to the username, the email or any part of them.
    pub check_user_attributes: bool,
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            check_user_attributes: true,
        }
    }
}

/// Similarity ratio at or above which a password counts as derived from a user attribute.
const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "123456789", "12345678", "1234567890", "password", "password1", "password123",
    "qwerty", "qwerty123", "qwertyuiop", "abc123", "111111", "123123", "iloveyou", "admin",
    "admin123", "welcome", "welcome1", "letmein", "monkey", "dragon", "football", "baseball",
    "sunshine", "princess", "master", "shadow", "superman", "trustno1", "passw0rd", "1q2w3e4r",
    "zaq12wsx", "starwars", "whatever", "freedom", "michael", "jennifer", "computer",
    "testing", "testpass", "changeme", "secret", "login", "hello123",
];

/// Length, numeric-only, common-password and user-attribute rules.
#[derive(Debug, Clone, Default)]
pub struct DefaultPasswordPolicy {
    config: PasswordPolicyConfig,
}

impl DefaultPasswordPolicy {
    pub fn new(config: PasswordPolicyConfig) -> Self {
        Self { config }
    }

    /// Compares the password with the whole attribute and with each of its
    /// word parts (`jane.doe@mail.com` yields `jane`, `doe`, `mail`, `com`).
    fn too_similar(password: &str, attribute: &str) -> bool {
        let password = password.to_lowercase();
        let attribute = attribute.to_lowercase();
        attribute
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|part| !part.is_empty())
            .chain(std::iter::once(attribute.as_str()))
            .any(|part| {
                !far_shorter_than(part, &password) && similarity_ratio(&password, part) >= MAX_SIMILARITY
            })
    }
}

/// An attribute this much shorter than the password cannot reach the
/// similarity threshold in any meaningful way.
fn far_shorter_than(part: &str, password: &str) -> bool {
    let password_len = password.chars().count();
    let part_len = part.chars().count();
    password_len >= 10 * part_len && (part_len as f64) < MAX_SIMILARITY / 2.0 * password_len as f64
}

/// `2 * M / T` where `M` counts the characters both strings share (with
/// multiplicity, order ignored) and `T` is their combined length.
fn similarity_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }
    let mut matches = 0usize;
    for c in a.chars() {
        if let Some(count) = available.get_mut(&c) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }
    2.0 * matches as f64 / total as f64
}

impl PasswordPolicy for DefaultPasswordPolicy {
    fn check(&self, password: &str, attributes: UserAttributes<'_>) -> Vec<String> {
        let mut messages = Vec::new();

        if password.chars().count() < self.config.min_length {
            messages.push(format!(
                "This password is too short. It must contain at least {} characters.",
                self.config.min_length
            ));
        }

        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            messages.push("This password is entirely numeric.".to_string());
        }

        let lowered = password.trim().to_lowercase();
        if COMMON_PASSWORDS.contains(&lowered.as_str()) {
            messages.push("This password is too common.".to_string());
        }

        if self.config.check_user_attributes && !password.is_empty() {
            if let Some(username) = attributes.username {
                if Self::too_similar(password, username) {
                    messages.push("The password is too similar to the username.".to_string());
                }
            }
            if let Some(email) = attributes.email {
                if Self::too_similar(password, email) {
                    messages.push("The password is too similar to the email address.".to_string());
                }
            }
        }

        messages
    }
}

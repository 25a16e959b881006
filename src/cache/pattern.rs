//! Purge patterns.
//!
//! A pattern without `*` or `?` is a key prefix. Otherwise it is a glob
//! matched against the whole key: `*` matches any run of characters
//! (including none), `?` exactly one.

use crate::error::{GatewayError, ValidationRule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgePattern {
    Prefix(String),
    Glob(Vec<char>),
}

impl PurgePattern {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        if raw.is_empty() {
            return Err(GatewayError::validation(
                ValidationRule::InvalidPattern,
                "purge pattern must not be empty (use '*' to purge everything)",
            ));
        }
        if raw.contains(['*', '?']) {
            Ok(Self::Glob(raw.chars().collect()))
        } else {
            Ok(Self::Prefix(raw.to_string()))
        }
    }

    /// The longest literal prefix, used to narrow the store listing.
    pub fn literal_prefix(&self) -> String {
        match self {
            Self::Prefix(prefix) => prefix.clone(),
            Self::Glob(chars) => chars
                .iter()
                .take_while(|c| **c != '*' && **c != '?')
                .collect(),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Self::Glob(pattern) => glob_matches(pattern, &key.chars().collect::<Vec<_>>()),
        }
    }
}

/// Wildcard match, backtracking to the most recent `*` only.
/// Worst case O(n·m) in pattern and key length.
fn glob_matches(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

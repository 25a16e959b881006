//! Bearer credential verification.

use sha2::{Digest, Sha256};

use crate::config::schema::AuthConfig;

/// The authenticated caller, attached to the request by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
}

/// Configured API keys, held as SHA-256 digests.
#[derive(Debug, Default)]
pub struct ApiKeyRing {
    keys: Vec<([u8; 32], String)>,
}

impl ApiKeyRing {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            keys: config
                .api_keys
                .iter()
                .map(|k| (digest(&k.secret), k.id.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolve a presented bearer secret to its principal.
    pub fn authenticate(&self, secret: &str) -> Option<Principal> {
        let presented = digest(secret);
        // Compare every key without early exit.
        let mut found = None;
        for (stored, id) in &self.keys {
            let diff = stored
                .iter()
                .zip(presented.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b));
            if diff == 0 && found.is_none() {
                found = Some(Principal { id: id.clone() });
            }
        }
        found
    }
}

fn digest(secret: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(secret.as_bytes()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApiKeyConfig;

    fn ring() -> ApiKeyRing {
        ApiKeyRing::from_config(&AuthConfig {
            api_keys: vec![
                ApiKeyConfig {
                    id: "admin-panel".into(),
                    secret: "admin-secret".into(),
                },
                ApiKeyConfig {
                    id: "master-console".into(),
                    secret: "master-secret".into(),
                },
            ],
        })
    }

    #[test]
    fn test_known_secret_resolves_principal() {
        let principal = ring().authenticate("master-secret").unwrap();
        assert_eq!(principal.id, "master-console");
    }

    #[test]
    fn test_unknown_secret_is_rejected() {
        assert!(ring().authenticate("guess").is_none());
        assert!(ring().authenticate("").is_none());
        assert!(ApiKeyRing::default().authenticate("admin-secret").is_none());
    }
}

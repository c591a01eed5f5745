//! Fetch identity rotation
//!
//! Each request presents one of a fixed set of identities (User-Agent plus
//! Accept-Language). The rotation index belongs to the owning `Fetcher`, so
//! concurrent audits never share a counter.

use std::sync::atomic::{AtomicUsize, Ordering};

const ACCEPT_LANGUAGES: &[&str] = &["en-US,en;q=0.9", "en-GB,en;q=0.8", "en;q=0.7"];

/// Headers presented for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub accept_language: String,
}

/// Round-robin identity state owned by a single fetcher
#[derive(Debug)]
pub struct IdentityRotation {
    identities: Vec<Identity>,
    next: AtomicUsize,
}

impl IdentityRotation {
    /// Builds a rotation from a list of User-Agent strings
    ///
    /// An empty list falls back to a single generic identity.
    pub fn new(user_agents: &[String]) -> Self {
        let mut identities: Vec<Identity> = user_agents
            .iter()
            .enumerate()
            .map(|(i, ua)| Identity {
                user_agent: ua.clone(),
                accept_language: ACCEPT_LANGUAGES[i % ACCEPT_LANGUAGES.len()].to_string(),
            })
            .collect();

        if identities.is_empty() {
            identities.push(Identity {
                user_agent: concat!("seo-sweep/", env!("CARGO_PKG_VERSION")).to_string(),
                accept_language: ACCEPT_LANGUAGES[0].to_string(),
            });
        }

        Self {
            identities,
            next: AtomicUsize::new(0),
        }
    }

    /// Returns the identity for the next request and advances the rotation
    pub fn advance(&self) -> &Identity {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.identities.len();
        &self.identities[index]
    }

    /// Number of identities in the rotation
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Always false; a rotation holds at least one identity
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

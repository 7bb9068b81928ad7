//! Short, URL-safe permalink hashes for recipes.
//!
//! Candidates are truncated SHA-256 digests of a random UUID, so uniqueness
//! is probabilistic; every candidate is checked against the table and the
//! generator gives up after a fixed number of collisions.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use sha2::{Digest, Sha256};
use sqlx::{Postgres, Transaction};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

pub const SHORT_HASH_LENGTH: usize = 8;
pub const HASH_GENERATION_ATTEMPTS: usize = 10;

#[derive(Debug, Error)]
pub enum ShortHashError {
    #[error("failed to generate a unique short hash after {0} attempts")]
    Exhausted(usize),
    #[error(transparent)]
    Lookup(#[from] anyhow::Error),
}

/// Answers whether a short hash is already in use.
#[async_trait]
pub trait ShortHashLookup: Send {
    async fn is_taken(&mut self, hash: &str) -> anyhow::Result<bool>;
}

#[async_trait]
impl<'c> ShortHashLookup for Transaction<'c, Postgres> {
    async fn is_taken(&mut self, hash: &str) -> anyhow::Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM recipes WHERE short_hash = $1)")
                .bind(hash)
                .fetch_one(&mut **self)
                .await?;
        Ok(taken)
    }
}

/// One candidate: base64url(sha256(uuid4 hex)) cut to [`SHORT_HASH_LENGTH`].
pub fn candidate() -> String {
    let seed = Uuid::new_v4().simple().to_string();
    let digest = Sha256::digest(seed.as_bytes());
    let mut encoded = URL_SAFE.encode(digest);
    encoded.truncate(SHORT_HASH_LENGTH);
    encoded
}

pub async fn generate_unique<L>(lookup: &mut L) -> Result<String, ShortHashError>
where
    L: ShortHashLookup + ?Sized,
{
    for attempt in 1..=HASH_GENERATION_ATTEMPTS {
        let hash = candidate();
        if !lookup.is_taken(&hash).await? {
            return Ok(hash);
        }
        warn!(attempt, "short hash collision");
    }
    error!(attempts = HASH_GENERATION_ATTEMPTS, "short hash space exhausted");
    Err(ShortHashError::Exhausted(HASH_GENERATION_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Reports the first `collisions` lookups as taken.
    struct Colliding {
        collisions: usize,
        calls: usize,
        seen: HashSet<String>,
    }

    impl Colliding {
        fn new(collisions: usize) -> Self {
            Self {
                collisions,
                calls: 0,
                seen: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl ShortHashLookup for Colliding {
        async fn is_taken(&mut self, hash: &str) -> anyhow::Result<bool> {
            self.calls += 1;
            self.seen.insert(hash.to_string());
            Ok(self.calls <= self.collisions)
        }
    }

    struct Broken;

    #[async_trait]
    impl ShortHashLookup for Broken {
        async fn is_taken(&mut self, _hash: &str) -> anyhow::Result<bool> {
            anyhow::bail!("db down")
        }
    }

    #[test]
    fn candidate_is_fixed_length_and_url_safe() {
        for _ in 0..100 {
            let h = candidate();
            assert_eq!(h.len(), SHORT_HASH_LENGTH);
            assert!(h
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn candidates_differ() {
        let hashes: HashSet<String> = (0..1000).map(|_| candidate()).collect();
        assert_eq!(hashes.len(), 1000);
    }

    #[tokio::test]
    async fn first_free_candidate_is_returned() {
        let mut lookup = Colliding::new(0);
        let hash = generate_unique(&mut lookup).await.unwrap();
        assert_eq!(lookup.calls, 1);
        assert!(lookup.seen.contains(&hash));
    }

    #[tokio::test]
    async fn retries_after_collisions() {
        let mut lookup = Colliding::new(HASH_GENERATION_ATTEMPTS - 1);
        generate_unique(&mut lookup).await.unwrap();
        assert_eq!(lookup.calls, HASH_GENERATION_ATTEMPTS);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let mut lookup = Colliding::new(usize::MAX);
        let err = generate_unique(&mut lookup).await.unwrap_err();
        assert!(matches!(err, ShortHashError::Exhausted(n) if n == HASH_GENERATION_ATTEMPTS));
        assert_eq!(lookup.calls, HASH_GENERATION_ATTEMPTS);
    }

    #[tokio::test]
    async fn lookup_failures_propagate() {
        let err = generate_unique(&mut Broken).await.unwrap_err();
        assert!(matches!(err, ShortHashError::Lookup(_)));
    }
}

//! One-time keys that stand in for a credential across a process boundary.
//!
//! A handler that holds the session mints a key; a detached download, which
//! cannot see the session cookie, redeems it. Entries expire on their own and
//! may be read any number of times before that.

use crate::SecurityError;
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Random bytes per token, hex-encoded on the wire.
pub const TOKEN_BYTES: usize = 28;
const MAX_MINT_ATTEMPTS: usize = 3;

pub fn random_token() -> String {
    let mut bytes = [0_u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Key-value service with per-entry expiry and atomic per-key writes.
#[async_trait]
pub trait TokenStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Stores the entry only if `token` is unused; returns whether it was stored.
    async fn insert_new(
        &self,
        token: &str,
        credential: &str,
        ttl: Duration,
    ) -> Result<bool, SecurityError>;

    async fn get(&self, token: &str) -> Result<Option<String>, SecurityError>;
}

#[derive(Clone)]
pub struct CorrelationTokens {
    store: Arc<dyn TokenStore>,
    ttl: Duration,
}

impl CorrelationTokens {
    pub fn new(store: Arc<dyn TokenStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn mint(&self, credential: &str) -> Result<String, SecurityError> {
        for _ in 0..MAX_MINT_ATTEMPTS {
            let token = random_token();
            if self.store.insert_new(&token, credential, self.ttl).await? {
                tracing::debug!(ttl_secs = self.ttl.as_secs(), "minted correlation token");
                return Ok(token);
            }
            tracing::warn!("correlation token collision; retrying");
        }
        Err(SecurityError::TokenCollision)
    }

    /// `None` means unknown or expired; callers answer "authentication required".
    pub async fn redeem(&self, token: &str) -> Result<Option<String>, SecurityError> {
        if !is_well_formed(token) {
            return Ok(None);
        }
        let credential = self.store.get(token).await?;
        tracing::debug!(found = credential.is_some(), "redeemed correlation token");
        Ok(credential)
    }
}

/// In-process store for single-instance deployments and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTokenStore").finish_non_exhaustive()
    }
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_new(
        &self,
        token: &str,
        credential: &str,
        ttl: Duration,
    ) -> Result<bool, SecurityError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        if entries.contains_key(token) {
            return Ok(false);
        }
        entries.insert(token.to_string(), (credential.to_string(), now + ttl));
        Ok(true)
    }

    async fn get(&self, token: &str) -> Result<Option<String>, SecurityError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(token)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(credential, _)| credential.clone()))
    }
}

/// Redis/Valkey store; expiry is enforced by the server (`SET .. NX EX`).
pub struct RedisTokenStore {
    client: redis::Client,
    key_prefix: String,
    connection: Arc<Mutex<Option<redis::aio::MultiplexedConnection>>>,
}

impl std::fmt::Debug for RedisTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTokenStore")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisTokenStore {
    pub fn new(url: &str, key_prefix: impl Into<String>) -> Result<Self, SecurityError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            key_prefix: key_prefix.into(),
            connection: Arc::new(Mutex::new(None)),
        })
    }

    fn key(&self, token: &str) -> String {
        format!("{}:{}", self.key_prefix, token)
    }

    /// Clone of the shared multiplexed connection. The lock is released before any command runs.
    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, SecurityError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn run_command<T, F>(&self, operation: &'static str, build: F) -> Result<T, SecurityError>
    where
        T: redis::FromRedisValue + Send,
        F: Fn() -> redis::Cmd,
    {
        let mut last_err = None;
        for attempt in 0..2 {
            let mut conn = self.connection().await?;
            let result: redis::RedisResult<T> = build().query_async(&mut conn).await;
            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        error = %err,
                        "correlation store command failed; reconnecting"
                    );
                    *self.connection.lock().await = None;
                    last_err = Some(err);
                }
            }
        }
        Err(last_err
            .map(SecurityError::from)
            .unwrap_or(SecurityError::StoreUnavailable))
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn insert_new(
        &self,
        token: &str,
        credential: &str,
        ttl: Duration,
    ) -> Result<bool, SecurityError> {
        let key = self.key(token);
        let ttl_secs = ttl.as_secs().max(1);
        let reply: Option<String> = self
            .run_command("set", || {
                let mut cmd = redis::cmd("SET");
                cmd.arg(&key)
                    .arg(credential)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs);
                cmd
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, token: &str) -> Result<Option<String>, SecurityError> {
        let key = self.key(token);
        self.run_command("get", || {
            let mut cmd = redis::cmd("GET");
            cmd.arg(&key);
            cmd
        })
        .await
    }
}

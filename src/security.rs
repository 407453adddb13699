//! Delivery signing, per-endpoint rate limiting, and at-rest secret
//! encryption.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::error::CryptoError;
use crate::types::EndpointId;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LENGTH: usize = 12;

/// Compute the delivery signature: HMAC-SHA256 over `{timestamp}.{payload}`,
/// hex-encoded with a `sha256=` prefix.
pub fn compute_signature(secret: &[u8], timestamp: &str, payload: &[u8]) -> String {
    // Qualified: `aes_gcm::aead::KeyInit` is also in scope and `Hmac`
    // implements both init traits.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).unwrap_or_else(|_| {
        // Hmac accepts keys of any length; this branch is unreachable.
        <HmacSha256 as Mac>::new_from_slice(b"-").expect("hmac")
    });
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signature produced by [`compute_signature`].
pub fn verify_signature(secret: &[u8], timestamp: &str, payload: &[u8], signature: &str) -> bool {
    let Some(hex_part) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_part) else {
        return false;
    };
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Timestamp freshness check for receivers of our callbacks.
pub fn is_timestamp_fresh(timestamp_secs: u64, now_secs: u64, max_age_secs: u64) -> bool {
    now_secs >= timestamp_secs && now_secs - timestamp_secs <= max_age_secs
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Estimated wait until a token becomes available.
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }
}

/// Token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_per_sec: u32) -> Self {
        let cap = capacity.max(1) as f64;
        Self {
            capacity: cap,
            tokens: cap,
            refill_per_sec: refill_per_sec.max(1) as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_take(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token is refilled at the current rate.
    fn time_until_token(&self) -> Duration {
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(missing / self.refill_per_sec)
    }
}

/// Per-endpoint rate limiter.
///
/// Stateless apart from the buckets; buckets are behind their own mutex so
/// concurrent in-flight dispatches stay safe.
pub struct RateLimiter {
    default_rps: u32,
    default_burst: u32,
    buckets: RwLock<HashMap<EndpointId, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    pub fn new(default_rps: u32, default_burst: u32) -> Self {
        Self {
            default_rps,
            default_burst,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Override the bucket parameters for one endpoint.
    pub async fn configure(&self, endpoint_id: EndpointId, rps: u32, burst: u32) {
        let mut guard = self.buckets.write().await;
        guard.insert(endpoint_id, Arc::new(Mutex::new(TokenBucket::new(burst, rps))));
    }

    /// Drop state for a removed endpoint.
    pub async fn forget(&self, endpoint_id: &EndpointId) {
        self.buckets.write().await.remove(endpoint_id);
    }

    /// Consume one token for the endpoint, creating its bucket on first use.
    pub async fn check(&self, endpoint_id: &EndpointId) -> RateLimitDecision {
        let bucket = {
            let guard = self.buckets.read().await;
            guard.get(endpoint_id).cloned()
        };

        let bucket = match bucket {
            Some(b) => b,
            None => {
                let mut guard = self.buckets.write().await;
                guard
                    .entry(endpoint_id.clone())
                    .or_insert_with(|| {
                        Arc::new(Mutex::new(TokenBucket::new(
                            self.default_burst,
                            self.default_rps,
                        )))
                    })
                    .clone()
            }
        };

        let mut bucket = bucket.lock().await;
        if bucket.try_take() {
            RateLimitDecision::allowed()
        } else {
            RateLimitDecision {
                allowed: false,
                retry_after: Some(bucket.time_until_token()),
            }
        }
    }
}

/// AES-256-GCM cipher for endpoint secrets at rest.
///
/// Output format: base64(nonce || ciphertext).
#[derive(Clone)]
pub struct SecretCipher {
    master_key: Arc<[u8; 32]>,
}

impl SecretCipher {
    /// Accepts a raw 32-byte key or a 64-character hex key.
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        let key_bytes = if master_key.len() == 32 {
            master_key.as_bytes().to_vec()
        } else if master_key.len() == 64 {
            hex::decode(master_key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?
        } else {
            return Err(CryptoError::InvalidKey(
                "master key must be 32 bytes or 64 hex characters".to_string(),
            ));
        };

        if key_bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(
                "master key must decode to exactly 32 bytes".to_string(),
            ));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        Ok(Self {
            master_key: Arc::new(key),
        })
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new(self.master_key.as_slice().into());
        let nonce = Aes256Gcm::generate_nonce(&mut aes_gcm::aead::OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, data)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut combined = nonce.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, CryptoError> {
        let data = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::Decrypt(format!("base64: {e}")))?;

        if data.len() < NONCE_LENGTH {
            return Err(CryptoError::Decrypt("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LENGTH);
        let cipher = Aes256Gcm::new(self.master_key.as_slice().into());
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))
    }

    pub fn encrypt_str(&self, data: &str) -> Result<String, CryptoError> {
        self.encrypt(data.as_bytes())
    }

    pub fn decrypt_str(&self, encoded: &str) -> Result<String, CryptoError> {
        let plain = self.decrypt(encoded)?;
        String::from_utf8(plain).map_err(|e| CryptoError::Decrypt(format!("utf-8: {e}")))
    }

    /// Generate a random key in the hex form accepted by [`SecretCipher::new`].
    pub fn generate_key() -> String {
        use rand::RngCore;
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        hex::encode(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip() {
        let secret = b"test_secret";
        let payload = br#"{"test":"data"}"#;
        let signature = compute_signature(secret, "1234567890", payload);

        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), 71); // "sha256=" + 64 hex chars
        assert!(verify_signature(secret, "1234567890", payload, &signature));
        assert!(!verify_signature(secret, "1234567891", payload, &signature));
        assert!(!verify_signature(b"other", "1234567890", payload, &signature));
    }

    #[test]
    fn signature_rejects_malformed_input() {
        assert!(!verify_signature(b"s", "1", b"p", "not-prefixed"));
        assert!(!verify_signature(b"s", "1", b"p", "sha256=zzzz"));
    }

    #[test]
    fn timestamp_freshness() {
        assert!(is_timestamp_fresh(1_700_000_000, 1_700_000_100, 300));
        assert!(!is_timestamp_fresh(1_700_000_000, 1_700_000_400, 300));
        // Timestamps from the future are never fresh.
        assert!(!is_timestamp_fresh(1_700_000_100, 1_700_000_000, 300));
    }

    #[tokio::test]
    async fn rate_limiter_exhausts_and_reports_retry_after() {
        let limiter = RateLimiter::new(1, 2);
        let id = EndpointId("ep".to_string());

        assert!(limiter.check(&id).await.allowed);
        assert!(limiter.check(&id).await.allowed);

        let decision = limiter.check(&id).await;
        assert!(!decision.allowed);
        assert!(decision.retry_after.is_some());
    }

    #[tokio::test]
    async fn rate_limiter_isolates_endpoints() {
        let limiter = RateLimiter::new(1, 1);
        let a = EndpointId("a".to_string());
        let b = EndpointId("b".to_string());

        assert!(limiter.check(&a).await.allowed);
        assert!(!limiter.check(&a).await.allowed);
        assert!(limiter.check(&b).await.allowed);
    }

    #[test]
    fn cipher_roundtrip() {
        let cipher = SecretCipher::new("12345678901234567890123456789012").unwrap();
        let encrypted = cipher.encrypt_str("hunter2").unwrap();
        assert_ne!(encrypted, "hunter2");
        assert_eq!(cipher.decrypt_str(&encrypted).unwrap(), "hunter2");
    }

    #[test]
    fn cipher_output_differs_per_call() {
        let cipher = SecretCipher::new(&SecretCipher::generate_key()).unwrap();
        let one = cipher.encrypt_str("same").unwrap();
        let two = cipher.encrypt_str("same").unwrap();
        assert_ne!(one, two);
    }

    #[test]
    fn cipher_rejects_bad_keys_and_ciphertext() {
        assert!(SecretCipher::new("short").is_err());

        let cipher = SecretCipher::new("12345678901234567890123456789012").unwrap();
        assert!(cipher.decrypt_str("not base64!!").is_err());
        assert!(cipher.decrypt_str(&BASE64.encode(b"tiny")).is_err());

        let other = SecretCipher::new("09876543210987654321098765432109").unwrap();
        let encrypted = cipher.encrypt_str("value").unwrap();
        assert!(other.decrypt_str(&encrypted).is_err());
    }
}

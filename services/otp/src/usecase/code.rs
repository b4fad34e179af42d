//! Code generation and at-rest hashing.
//!
//! Codes are 6 decimal digits drawn from a generator seeded once per process.
//! Hashes are Argon2id PHC strings with an embedded random salt and an
//! optional server-side pepper.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context as _;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::domain::types::OTP_LEN;
use crate::error::OtpServiceError;

const CODE_SPACE: u32 = 1_000_000;
const SALT_LEN: usize = 16;

/// Process-wide numeric code source.
///
/// Seeded from the OS-backed thread RNG exactly once, in [`CodeGenerator::new`];
/// each call to [`generate`](Self::generate) is an independent draw.
pub struct CodeGenerator {
    rng: Mutex<StdRng>,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_rng(&mut rand::rng())),
        }
    }

    /// Uniform over `000000..=999999`, left-zero-padded.
    pub fn generate(&self) -> String {
        let n = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..CODE_SPACE);
        format!("{n:0width$}", width = OTP_LEN)
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Salted one-way hashing of codes with timing-safe verification.
///
/// Cheap to clone; clones share the pepper and decoy hash.
#[derive(Clone)]
pub struct CodeHasher {
    params: Params,
    pepper: Option<Arc<[u8]>>,
    decoy: Arc<str>,
}

impl CodeHasher {
    pub fn new(cost: HashCost, pepper: Option<&[u8]>) -> Result<Self, OtpServiceError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 cost parameters: {e}"))?;
        let mut hasher = Self {
            params,
            pepper: pepper.map(Arc::from),
            decoy: Arc::from(""),
        };
        let decoy = hasher.hash(&"0".repeat(OTP_LEN))?;
        hasher.decoy = Arc::from(decoy);
        Ok(hasher)
    }

    fn argon2(&self) -> Result<Argon2<'_>, OtpServiceError> {
        let argon2 = match &self.pepper {
            Some(pepper) => Argon2::new_with_secret(
                pepper,
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            )
            .map_err(|e| anyhow::anyhow!("failed to initialize argon2id: {e}"))?,
            None => Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone()),
        };
        Ok(argon2)
    }

    /// Hash `code` with a fresh salt. Fails only if the OS entropy source does.
    pub fn hash(&self, code: &str) -> Result<String, OtpServiceError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|e| anyhow::anyhow!("entropy source failed: {e}"))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| anyhow::anyhow!("failed to encode salt: {e}"))?;
        let hash = self
            .argon2()?
            .hash_password(code.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("failed to hash otp: {e}"))?
            .to_string();
        Ok(hash)
    }

    /// `true` iff `code` matches `stored`. Malformed hashes verify as `false`.
    pub fn verify(&self, code: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        let Ok(argon2) = self.argon2() else {
            return false;
        };
        argon2.verify_password(code.as_bytes(), &parsed).is_ok()
    }

    /// Spend one verification's worth of work without a real candidate.
    pub fn verify_decoy(&self, code: &str) {
        let _ = self.verify(code, &self.decoy);
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, code: String) -> Result<String, OtpServiceError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&code))
            .await
            .context("join otp hash task")?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(
        &self,
        code: String,
        stored: String,
    ) -> Result<bool, OtpServiceError> {
        let hasher = self.clone();
        let matched = tokio::task::spawn_blocking(move || hasher.verify(&code, &stored))
            .await
            .context("join otp verify task")?;
        Ok(matched)
    }

    /// [`verify_decoy`](Self::verify_decoy) on the blocking pool.
    pub async fn verify_decoy_blocking(&self, code: String) -> Result<(), OtpServiceError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_decoy(&code))
            .await
            .context("join otp decoy task")?;
        Ok(())
    }
}

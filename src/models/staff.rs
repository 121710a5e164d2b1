use super::{default_true, trim, trim_opt, IndexSpec, Model, RecordId};
use crate::error::{BazaarError, BazaarResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// An admin-panel user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    /// Id of the matching user in the hosted auth service
    #[serde(default)]
    pub auth_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    /// Plain text on input; an argon2 PHC string once saved
    #[validate(length(min = 8))]
    pub password: String,
    pub role: RecordId,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Staff {
    /// Whether `password` is already an argon2 PHC string with salt and hash
    fn is_hashed(&self) -> bool {
        match PasswordHash::new(&self.password) {
            Ok(parsed) => {
                matches!(parsed.algorithm.as_str(), "argon2id" | "argon2i" | "argon2d")
                    && parsed.salt.is_some()
                    && parsed.hash.is_some()
            }
            Err(_) => false,
        }
    }

    /// Checks `candidate` against the stored hash
    pub fn verify_password(&self, candidate: &str) -> bool {
        match PasswordHash::new(&self.password) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl Model for Staff {
    const COLLECTION: &'static str = "staff";

    fn indexes() -> &'static [IndexSpec] {
        const INDEXES: &[IndexSpec] = &[IndexSpec::unique(&["email"]), IndexSpec::secondary(&["authId"])];
        INDEXES
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
        trim_opt(&mut self.auth_id);
        self.email = self.email.trim().to_lowercase();
    }

    fn before_save(&mut self) -> BazaarResult<()> {
        if self.is_hashed() {
            return Ok(());
        }
        let salt = SaltString::generate(&mut OsRng);
        self.password = Argon2::default()
            .hash_password(self.password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| BazaarError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?;
        Ok(())
    }
}

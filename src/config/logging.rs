// ============================================================================
// Logging Configuration
// ============================================================================

const PLACEHOLDER_SALT: &str = "default-salt-please-change";

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Salt for `log_safe_id`; device ids never reach the logs in plaintext
    pub hash_salt: String,
}

impl LoggingConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let salt =
            std::env::var("LOG_HASH_SALT").unwrap_or_else(|_| PLACEHOLDER_SALT.to_string());
        if salt.is_empty() || salt == PLACEHOLDER_SALT {
            anyhow::bail!("LOG_HASH_SALT must be set to a unique, secret value");
        }

        Ok(Self { hash_salt: salt })
    }
}

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "schoolcache";

/// Environment variable that overrides the keychain (CI, containers).
pub const TOKEN_ENV: &str = "SCHOOLCACHE_TOKEN";

pub struct TokenStore;

impl TokenStore {
    /// Store an admin token for `username` in the OS keychain
    pub fn store(username: &str, token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username).context("Failed to create keyring entry")?;
        entry
            .set_password(token)
            .context("Failed to store token in keychain")?;
        Ok(())
    }

    /// Retrieve the admin token for `username` from the OS keychain
    pub fn get_token(username: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, username).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve token from keychain")
    }

    /// Token from `SCHOOLCACHE_TOKEN`, else from the keychain
    pub fn resolve(username: Option<&str>) -> Result<String> {
        if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()) {
            return Ok(token.trim().to_string());
        }
        let username = username.context("No admin user configured and SCHOOLCACHE_TOKEN is unset")?;
        Self::get_token(username)
    }

    /// Remove the keychain entry for `username`
    pub fn delete(username: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete token from keychain")?;
        Ok(())
    }
}

use zeroize::Zeroizing;

use crate::error::{Result, TallyError};

#[cfg(feature = "vault")]
const SERVICE: &str = "tally";

/// Env override for headless use (CI, cron): takes priority over the
/// OS keychain when set.
pub const TOKEN_ENV: &str = "TALLY_ACCESS_TOKEN";

/// Store the provider access token for a linked item in the OS keychain.
/// Tokens are opaque to us and never written to the database.
#[cfg(feature = "vault")]
pub fn store_access_token(item_id: &str, token: &str) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE, item_id)
        .map_err(|e| TallyError::Vault(e.to_string()))?;
    entry
        .set_password(token)
        .map_err(|e| TallyError::Vault(e.to_string()))
}

#[cfg(not(feature = "vault"))]
pub fn store_access_token(_item_id: &str, _token: &str) -> Result<()> {
    Err(TallyError::Vault(
        "built without the vault feature; set TALLY_ACCESS_TOKEN instead".to_string(),
    ))
}

pub fn get_access_token(item_id: &str) -> Result<Zeroizing<String>> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        return Ok(Zeroizing::new(token));
    }
    keychain_token(item_id)
}

#[cfg(feature = "vault")]
fn keychain_token(item_id: &str) -> Result<Zeroizing<String>> {
    let entry = keyring::Entry::new(SERVICE, item_id)
        .map_err(|e| TallyError::Vault(e.to_string()))?;
    entry
        .get_password()
        .map(Zeroizing::new)
        .map_err(|e| TallyError::Vault(format!("no access token for {item_id}: {e}")))
}

#[cfg(not(feature = "vault"))]
fn keychain_token(item_id: &str) -> Result<Zeroizing<String>> {
    Err(TallyError::Vault(format!(
        "no access token for {item_id}: built without the vault feature"
    )))
}

#[cfg(feature = "vault")]
pub fn delete_access_token(item_id: &str) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE, item_id)
        .map_err(|e| TallyError::Vault(e.to_string()))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(TallyError::Vault(e.to_string())),
    }
}

#[cfg(not(feature = "vault"))]
pub fn delete_access_token(_item_id: &str) -> Result<()> {
    Ok(())
}

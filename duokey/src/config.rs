//! Environment-based configuration.
//!
//! Values are read through a lookup closure so tests can supply a map
//! instead of mutating the process environment. [`Credentials::from_env`]
//! loads a `.env` file first when one is present.

use crate::credentials::Credentials;
use crate::error::{DuoKeyError, DuoKeyResult};
use crate::transport::DEFAULT_TENANT_HEADER;
use secrecy::SecretString;
use std::env;
use std::str::FromStr;

/// Application id
pub const APP_ID: &str = "DUOKEY_APP_ID";
/// OIDC issuer URL
pub const ISSUER: &str = "DUOKEY_ISSUER";
/// OAuth2 client id
pub const CLIENT_ID: &str = "DUOKEY_CLIENT_ID";
/// OAuth2 client secret
pub const CLIENT_SECRET: &str = "DUOKEY_CLIENT_SECRET";
/// Resource owner username
pub const USERNAME: &str = "DUOKEY_USERNAME";
/// Resource owner password
pub const PASSWORD: &str = "DUOKEY_PASSWORD";
/// Requested scope
pub const SCOPE: &str = "DUOKEY_SCOPE";
/// Tenant header name
pub const HEADER_TENANT_ID: &str = "DUOKEY_HEADER_TENANT_ID";
/// Tenant id
pub const TENANT_ID: &str = "DUOKEY_TENANT_ID";

/// Load variables from a `.env` file if there is one. Existing variables win.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Lookup backed by the process environment.
#[must_use]
pub fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Value of `key`, treating empty strings as absent.
pub fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// Value of `key`.
///
/// # Errors
///
/// Returns [`DuoKeyError::InvalidConfig`] if the variable is missing or empty.
pub fn required<F>(lookup: &F, key: &str) -> DuoKeyResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| DuoKeyError::invalid_config(format!("{key} is not set")))
}

/// Value of `key` parsed as `T`.
///
/// # Errors
///
/// Returns [`DuoKeyError::InvalidConfig`] if the variable is missing or does
/// not parse.
pub fn parse_required<T, F>(lookup: &F, key: &str) -> DuoKeyResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, key)?;
    raw.trim()
        .parse()
        .map_err(|e| DuoKeyError::invalid_config(format!("{key}={raw:?} is invalid: {e}")))
}

impl Credentials {
    /// Load credentials from `DUOKEY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidConfig`] if a required variable is
    /// missing or malformed.
    pub fn from_env() -> DuoKeyResult<Self> {
        load_dotenv();
        Self::from_lookup(process_env)
    }

    /// Load credentials through `lookup`.
    ///
    /// `DUOKEY_APP_ID`, `DUOKEY_SCOPE` and `DUOKEY_HEADER_TENANT_ID` are
    /// optional; everything else is required.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidConfig`] if a required variable is
    /// missing or malformed.
    pub fn from_lookup<F>(lookup: F) -> DuoKeyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tenant_header =
            optional(&lookup, HEADER_TENANT_ID).unwrap_or_else(|| DEFAULT_TENANT_HEADER.to_string());

        let credentials = Self::new(
            required(&lookup, ISSUER)?,
            required(&lookup, CLIENT_ID)?,
            SecretString::from(required(&lookup, CLIENT_SECRET)?),
            required(&lookup, USERNAME)?,
            SecretString::from(required(&lookup, PASSWORD)?),
        )
        .with_app_id(optional(&lookup, APP_ID).unwrap_or_default())
        .with_scope(optional(&lookup, SCOPE).unwrap_or_default())
        .with_tenant_header(tenant_header)
        .with_tenant_id(parse_required(&lookup, TENANT_ID)?);

        credentials.tenant_scope()?;
        Ok(credentials)
    }
}

//! Addresses of the KMS operations.

use duokey::config::{load_dotenv, optional, process_env, required};
use duokey::{DuoKeyError, DuoKeyResult};

/// Base URL
pub const BASE_URL: &str = "DUOKEY_BASE_URL";
/// Encrypt route
pub const ENCRYPT_ROUTE: &str = "DUOKEY_ENCRYPT_ROUTE";
/// Decrypt route
pub const DECRYPT_ROUTE: &str = "DUOKEY_DECRYPT_ROUTE";
/// Import route
pub const IMPORT_ROUTE: &str = "DUOKEY_IMPORT_ROUTE";
/// Key lookup route
pub const GET_KEY_ID_ROUTE: &str = "DUOKEY_GETKEYID_ROUTE";
/// CSR import route
pub const CSR_IMPORT_ROUTE: &str = "DUOKEY_CSRIMPORT_ROUTE";
/// CSR status route
pub const CSR_STATUS_ROUTE: &str = "DUOKEY_CSRSTATUS_ROUTE";

/// Base URL and per-operation routes of a DuoKey deployment.
///
/// Every route is customizable. An empty route disables its operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL, e.g. `https://kms.example.com`
    pub base_url: String,
    /// Encrypt route
    pub encrypt_route: String,
    /// Decrypt route
    pub decrypt_route: String,
    /// Import route
    pub import_route: String,
    /// Key lookup route
    pub get_key_id_route: String,
    /// CSR import route
    pub csr_import_route: String,
    /// CSR status route
    pub csr_status_route: String,
}

impl Endpoints {
    /// Endpoints on `base_url` with encrypt and decrypt routes.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        encrypt_route: impl Into<String>,
        decrypt_route: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            encrypt_route: encrypt_route.into(),
            decrypt_route: decrypt_route.into(),
            ..Self::default()
        }
    }

    /// Set the import route.
    #[must_use]
    pub fn with_import_route(mut self, route: impl Into<String>) -> Self {
        self.import_route = route.into();
        self
    }

    /// Set the key lookup route.
    #[must_use]
    pub fn with_get_key_id_route(mut self, route: impl Into<String>) -> Self {
        self.get_key_id_route = route.into();
        self
    }

    /// Set the CSR routes.
    #[must_use]
    pub fn with_csr_routes(
        mut self,
        import_route: impl Into<String>,
        status_route: impl Into<String>,
    ) -> Self {
        self.csr_import_route = import_route.into();
        self.csr_status_route = status_route.into();
        self
    }

    /// Load endpoints from `DUOKEY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidConfig`] if a required variable is missing.
    pub fn from_env() -> DuoKeyResult<Self> {
        load_dotenv();
        Self::from_lookup(process_env)
    }

    /// Load endpoints through `lookup`.
    ///
    /// Base URL, encrypt and decrypt routes are required; the others default
    /// to empty.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidConfig`] if a required variable is
    /// missing or the base URL is not absolute.
    pub fn from_lookup<F>(lookup: F) -> DuoKeyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = required(&lookup, BASE_URL)?;
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(DuoKeyError::invalid_config(format!(
                "{BASE_URL} must be an http(s) URL, got {base_url:?}"
            )));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            encrypt_route: required(&lookup, ENCRYPT_ROUTE)?,
            decrypt_route: required(&lookup, DECRYPT_ROUTE)?,
            import_route: optional(&lookup, IMPORT_ROUTE).unwrap_or_default(),
            get_key_id_route: optional(&lookup, GET_KEY_ID_ROUTE).unwrap_or_default(),
            csr_import_route: optional(&lookup, CSR_IMPORT_ROUTE).unwrap_or_default(),
            csr_status_route: optional(&lookup, CSR_STATUS_ROUTE).unwrap_or_default(),
        })
    }
}

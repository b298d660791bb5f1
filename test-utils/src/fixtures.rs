//! Test fixtures with sample data.

use duokey::Credentials;

/// Plaintext used by round-trip tests.
pub const LOREM_IPSUM: &str = "Lorem ipsum dolor sit amet";

/// Tenant id used by the sample credentials.
pub const TENANT_ID: u32 = 1;

/// Sample vault id.
pub const VAULT_ID: &str = "vault-7f3a";

/// Sample key id.
pub const KEY_ID: &str = "orders-master-key";

/// Username of the sample credentials.
pub const USERNAME: &str = "jane.doe";

/// Password of the sample credentials.
pub const PASSWORD: &str = "tooManyS3cr3ts!";

/// Client id of the sample credentials.
pub const CLIENT_ID: &str = "kms-client";

/// Credentials for tenant [`TENANT_ID`] under the default tenant header.
#[must_use]
pub fn sample_credentials(issuer: impl Into<String>) -> Credentials {
    Credentials::new(issuer, CLIENT_ID, "kms-client-secret", USERNAME, PASSWORD)
        .with_app_id("duokey-tests")
        .with_scope("key")
        .with_tenant_id(TENANT_ID)
}

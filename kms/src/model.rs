//! Request and response payloads of the KMS operations.

use crate::codec::base64_bytes;
use crate::envelope::AbpResponse;
use duokey::{DuoKeyError, DuoKeyResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn require(value: &str, what: &str) -> DuoKeyResult<()> {
    if value.trim().is_empty() {
        return Err(DuoKeyError::invalid_input(format!(
            "the {what} cannot be an empty string"
        )));
    }
    Ok(())
}

/// Payload to encrypt.
///
/// The server picks the algorithm from the vault and key unless
/// `algorithm` names a chaining mode or padding scheme. An IV or tag can be
/// supplied through `context`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptInput {
    /// Request id echoed by the server
    pub id: u32,
    /// Key id
    #[serde(rename = "keyid")]
    pub key_id: String,
    /// Vault id
    #[serde(rename = "vaultid")]
    pub vault_id: String,
    /// Algorithm, e.g. `RSA-OAEP-256` or `AES-GCM`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    /// Additional context such as `appid` or `ipaddr`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Plaintext
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
}

impl EncryptInput {
    /// Encrypt `payload` under the given key.
    #[must_use]
    pub fn new(
        key_id: impl Into<String>,
        vault_id: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            vault_id: vault_id.into(),
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// Set the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Add a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Check key and vault ids.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] if either is empty.
    pub fn validate(&self) -> DuoKeyResult<()> {
        require(&self.key_id, "key ID")?;
        require(&self.vault_id, "vault ID")
    }
}

/// Result of an encryption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResult {
    /// Key id
    #[serde(default, rename = "keyid")]
    pub key_id: String,
    /// Algorithm used
    #[serde(default)]
    pub algorithm: String,
    /// Ciphertext, on deployments that return it here
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// Ciphertext, on deployments that return it separately
    #[serde(default, rename = "encryptedPayload", with = "base64_bytes")]
    pub encrypted_payload: Vec<u8>,
    /// IV generated for AES-GCM, empty otherwise
    #[serde(default)]
    pub iv: String,
    /// Request id
    #[serde(default)]
    pub id: u32,
}

impl EncryptResult {
    /// The ciphertext, whichever field carried it.
    #[must_use]
    pub fn ciphertext(&self) -> &[u8] {
        if self.encrypted_payload.is_empty() {
            &self.payload
        } else {
            &self.encrypted_payload
        }
    }
}

/// Envelope returned by `encrypt`.
pub type EncryptOutput = AbpResponse<EncryptResult>;

/// Payload to decrypt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptInput {
    /// Request id echoed by the server
    pub id: u32,
    /// Key id
    #[serde(rename = "keyid")]
    pub key_id: String,
    /// Vault id
    #[serde(rename = "vaultid")]
    pub vault_id: String,
    /// Algorithm
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    /// Additional context
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Ciphertext
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// IV returned by `encrypt`, needed for AES-GCM only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iv: String,
}

impl DecryptInput {
    /// Decrypt `payload` under the given key.
    #[must_use]
    pub fn new(
        key_id: impl Into<String>,
        vault_id: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            vault_id: vault_id.into(),
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// Decrypt what `encrypt` returned, carrying over algorithm and IV.
    #[must_use]
    pub fn from_encrypted(vault_id: impl Into<String>, encrypted: &EncryptResult) -> Self {
        Self {
            key_id: encrypted.key_id.clone(),
            vault_id: vault_id.into(),
            algorithm: encrypted.algorithm.clone(),
            payload: encrypted.ciphertext().to_vec(),
            iv: encrypted.iv.clone(),
            ..Self::default()
        }
    }

    /// Set the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Add a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Set the IV.
    #[must_use]
    pub fn with_iv(mut self, iv: impl Into<String>) -> Self {
        self.iv = iv.into();
        self
    }

    /// Check key and vault ids.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] if either is empty.
    pub fn validate(&self) -> DuoKeyResult<()> {
        require(&self.key_id, "key ID")?;
        require(&self.vault_id, "vault ID")
    }
}

/// Result of a decryption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResult {
    /// Key id
    #[serde(default, rename = "keyid")]
    pub key_id: String,
    /// Algorithm used
    #[serde(default)]
    pub algorithm: String,
    /// Plaintext
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// Request id
    #[serde(default)]
    pub id: u32,
}

/// Envelope returned by `decrypt`.
pub type DecryptOutput = AbpResponse<DecryptResult>;

/// Key material to import into a vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportKeyInput {
    /// Request id
    pub id: u32,
    /// Id the key is stored under
    #[serde(rename = "keyid")]
    pub key_id: String,
    /// Vault id
    #[serde(rename = "vaultid")]
    pub vault_id: String,
    /// Key algorithm
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    /// Additional context
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Key material
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
}

impl ImportKeyInput {
    /// Import `material` as `key_id`.
    #[must_use]
    pub fn new(
        key_id: impl Into<String>,
        vault_id: impl Into<String>,
        material: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            vault_id: vault_id.into(),
            payload: material.into(),
            ..Self::default()
        }
    }

    /// Set the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Check ids and key material.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] if an id or the material is empty.
    pub fn validate(&self) -> DuoKeyResult<()> {
        require(&self.key_id, "key ID")?;
        require(&self.vault_id, "vault ID")?;
        if self.payload.is_empty() {
            return Err(DuoKeyError::invalid_input("the key material cannot be empty"));
        }
        Ok(())
    }
}

/// Result of a key import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportKeyResult {
    /// Key id
    #[serde(default, rename = "keyid")]
    pub key_id: String,
    /// Algorithm
    #[serde(default)]
    pub algorithm: String,
    /// Request id
    #[serde(default)]
    pub id: u32,
}

/// Envelope returned by `import_key`.
pub type ImportKeyOutput = AbpResponse<ImportKeyResult>;

/// Lookup of a key by its external id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetKeyIdInput {
    /// External id
    #[serde(rename = "externalId")]
    pub external_id: String,
}

impl GetKeyIdInput {
    /// Look up `external_id`.
    #[must_use]
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
        }
    }

    /// Check the external id.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] if it is empty.
    pub fn validate(&self) -> DuoKeyResult<()> {
        require(&self.external_id, "external ID")
    }
}

/// Key description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Internal key name
    #[serde(default)]
    pub name: String,
}

/// Result of a key lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetKeyIdResult {
    /// The key
    #[serde(default)]
    pub key: KeyInfo,
}

/// Envelope returned by `get_key_id`.
pub type GetKeyIdOutput = AbpResponse<GetKeyIdResult>;

/// Certificate signing request to import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrImportInput {
    /// PEM encoded CSR
    pub csr: String,
}

impl CsrImportInput {
    /// Import `csr`.
    #[must_use]
    pub fn new(csr: impl Into<String>) -> Self {
        Self { csr: csr.into() }
    }

    /// Check the CSR.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] if it is empty.
    pub fn validate(&self) -> DuoKeyResult<()> {
        require(&self.csr, "CSR")
    }
}

/// Envelope returned by `csr_import`; the result shape varies by deployment.
pub type CsrImportOutput = AbpResponse<Value>;

/// Status lookup for an imported CSR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrStatusInput {
    /// Common name of the CSR subject
    #[serde(rename = "commonName")]
    pub common_name: String,
}

impl CsrStatusInput {
    /// Look up the CSR issued for `common_name`.
    #[must_use]
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
        }
    }

    /// Check the common name.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] if it is empty.
    pub fn validate(&self) -> DuoKeyResult<()> {
        require(&self.common_name, "common name")
    }
}

/// CSR processing state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrStatusResult {
    /// Processing status reported by the server
    #[serde(default)]
    pub status: String,
    /// Issued certificate (PEM), empty until issued
    #[serde(default)]
    pub certificate: String,
}

/// Envelope returned by `csr_status`.
pub type CsrStatusOutput = AbpResponse<CsrStatusResult>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encrypt_input_wire_format() {
        let input = EncryptInput::new("k1", "v1", b"hi".to_vec()).with_algorithm("AES-GCM");
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"id": 0, "keyid": "k1", "vaultid": "v1", "algorithm": "AES-GCM", "payload": "aGk="})
        );
    }

    #[test]
    fn test_optional_fields_omitted() {
        let input = DecryptInput::new("k1", "v1", Vec::new());
        let value = serde_json::to_value(&input).unwrap();
        assert!(value.get("algorithm").is_none());
        assert!(value.get("context").is_none());
        assert!(value.get("iv").is_none());

        let input = input.with_iv("abc").with_context("appid", "app");
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["iv"], "abc");
        assert_eq!(value["context"]["appid"], "app");
    }

    #[test]
    fn test_validation_messages() {
        let err = EncryptInput::new("", "v1", Vec::new()).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input: the key ID cannot be an empty string"
        );
        let err = DecryptInput::new("k1", " ", Vec::new()).validate().unwrap_err();
        assert!(err.to_string().contains("vault ID"));
        assert!(ImportKeyInput::new("k1", "v1", Vec::new()).validate().is_err());
        assert!(GetKeyIdInput::new("").validate().is_err());
        assert!(CsrImportInput::new("").validate().is_err());
        assert!(CsrStatusInput::new("scepclient").validate().is_ok());
    }

    #[test]
    fn test_ciphertext_prefers_encrypted_payload() {
        let result: EncryptResult = serde_json::from_value(json!({
            "keyid": "k1",
            "payload": null,
            "encryptedPayload": "AQID",
            "iv": "nonce"
        }))
        .unwrap();
        assert_eq!(result.ciphertext(), &[1, 2, 3]);

        let decrypt = DecryptInput::from_encrypted("v1", &result);
        assert_eq!(decrypt.payload, vec![1, 2, 3]);
        assert_eq!(decrypt.iv, "nonce");
        assert_eq!(decrypt.key_id, "k1");
    }

    #[test]
    fn test_key_lookup_result() {
        let output: GetKeyIdOutput = serde_json::from_value(json!({
            "success": true,
            "result": {"key": {"name": "orders-master-key"}}
        }))
        .unwrap();
        assert_eq!(output.result().unwrap().key.name, "orders-master-key");
    }
}

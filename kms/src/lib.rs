//! Key-management service facade for DuoKey.
//!
//! [`Kms`] exposes encrypt, decrypt, key import, key lookup and CSR
//! operations on top of an authenticated [`duokey::Client`]. Routes come
//! from an [`Endpoints`] value; binary payloads travel as base64.
//!
//! ```no_run
//! use duokey::Credentials;
//! use duokey_kms::{DecryptInput, EncryptInput, Endpoints, Kms};
//!
//! # async fn run() -> duokey::DuoKeyResult<()> {
//! let kms = Kms::connect(&Credentials::from_env()?, &Endpoints::from_env()?).await?;
//!
//! let encrypted = kms
//!     .encrypt(EncryptInput::new("my-key", "my-vault", b"secret".to_vec()))
//!     .await?;
//! if let Some(result) = encrypted.result() {
//!     let plain = kms.decrypt(DecryptInput::from_encrypted("my-vault", result)).await?;
//!     # let _ = plain;
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod endpoints;
pub mod envelope;
pub mod model;
pub mod service;

pub use endpoints::Endpoints;
pub use envelope::{AbpError, AbpResponse};
pub use model::{
    CsrImportInput, CsrImportOutput, CsrStatusInput, CsrStatusOutput, CsrStatusResult,
    DecryptInput, DecryptOutput, DecryptResult, EncryptInput, EncryptOutput, EncryptResult,
    GetKeyIdInput, GetKeyIdOutput, GetKeyIdResult, ImportKeyInput, ImportKeyOutput,
    ImportKeyResult, KeyInfo,
};
pub use service::{Kms, KmsApi};

//! Client core for the DuoKey key-management service.
//!
//! This crate provides:
//! - Credential resolution (OIDC discovery and OAuth2 password grant)
//! - Tenant and authorization transport decorators with token refresh
//! - Operation descriptors and a request builder/executor
//! - Call contexts carrying cancellation and deadlines
//! - HTTP client, tracing and environment configuration
//!
//! Service facades such as `duokey-kms` are built on [`Client`].
//!
//! ```no_run
//! use duokey::{CallContext, Client, Credentials, Operation};
//! use serde_json::{Value, json};
//!
//! # async fn run() -> duokey::DuoKeyResult<()> {
//! let credentials = Credentials::from_env()?;
//! let client = Client::connect(&credentials).await?;
//!
//! let op = Operation::post("Encrypt", "https://kms.example.com", "/api/services/app/Crypto/Encrypt");
//! let reply: Value = client
//!     .new_request(&op, Some(json!({"keyid": "my-key"})))
//!     .send(&CallContext::background())
//!     .await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod http;
pub mod operation;
pub mod request;
pub mod token;
pub mod tracing_config;
pub mod transport;

pub use client::Client;
pub use context::CallContext;
pub use credentials::{CredentialResolver, Credentials, ProviderMetadata};
pub use error::{BuildError, DuoKeyError, DuoKeyResult, ErrorKind, TransportError};
pub use http::{HttpConfig, build_http_client};
pub use operation::{Operation, QueryEncoding};
pub use request::{Outcome, Request};
pub use token::{AccessToken, AuthorizedTransport, TokenEndpoint, TokenSource};
pub use tracing_config::{TracingConfig, init_tracing};
pub use transport::{DEFAULT_TENANT_HEADER, HttpTransport, TenantScope, TenantTransport};

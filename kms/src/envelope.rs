//! The response wrapper every DuoKey endpoint returns.

use duokey::Outcome;
use serde::{Deserialize, Serialize};

/// Error reported inside an envelope.
///
/// Older deployments send a bare string, newer ones an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AbpError {
    /// Plain message
    Message(String),
    /// Structured error
    Detail {
        /// Application error code
        #[serde(default)]
        code: i64,
        /// Message
        #[serde(default)]
        message: Option<String>,
        /// Additional details
        #[serde(default)]
        details: Option<String>,
    },
}

impl AbpError {
    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Message(message) => message.clone(),
            Self::Detail {
                message: Some(message),
                details: Some(details),
                ..
            } => format!("{message} ({details})"),
            Self::Detail {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Detail {
                details: Some(details),
                ..
            } => details.clone(),
            Self::Detail { code, .. } => format!("error code {code}"),
        }
    }
}

/// Response envelope: `{success, result, error, targetUrl, unAuthorizedRequest, __abp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbpResponse<T> {
    /// Whether the server handled the request
    #[serde(default)]
    pub success: bool,
    /// Operation result, absent on failure
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    /// Failure description
    #[serde(default)]
    pub error: Option<AbpError>,
    /// Redirect target, unused by the SDK
    #[serde(default, rename = "targetUrl")]
    pub target_url: Option<String>,
    /// Whether the server considered the caller unauthenticated
    #[serde(default, rename = "unAuthorizedRequest")]
    pub unauthorized_request: bool,
    /// Framework marker
    #[serde(default, rename = "__abp")]
    pub abp: bool,
}

impl<T> AbpResponse<T> {
    /// The result, if the server returned one.
    #[must_use]
    pub const fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }
}

impl<T> Outcome for AbpResponse<T> {
    fn failure(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.message());
        }
        if self.unauthorized_request {
            return Some("unauthorized request".to_string());
        }
        (!self.success).then(|| "server reported failure without details".to_string())
    }
}

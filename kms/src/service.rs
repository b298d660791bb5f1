//! The KMS service facade.

use crate::endpoints::Endpoints;
use crate::model::{
    CsrImportInput, CsrImportOutput, CsrStatusInput, CsrStatusOutput, DecryptInput, DecryptOutput,
    EncryptInput, EncryptOutput, GetKeyIdInput, GetKeyIdOutput, ImportKeyInput, ImportKeyOutput,
};
use async_trait::async_trait;
use duokey::{
    CallContext, Client, Credentials, DuoKeyError, DuoKeyResult, HttpConfig, Operation, Outcome,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument};

const OP_ENCRYPT: &str = "Encrypt";
const OP_DECRYPT: &str = "Decrypt";
const OP_IMPORT_KEY: &str = "ImportKey";
const OP_GET_KEY_ID: &str = "GetKeyId";
const OP_CSR_IMPORT: &str = "CsrImport";
const OP_CSR_STATUS: &str = "CsrStatus";

/// Operation descriptors, built once from the endpoints.
#[derive(Debug)]
struct Operations {
    encrypt: Operation,
    decrypt: Operation,
    import_key: Operation,
    get_key_id: Operation,
    csr_import: Operation,
    csr_status: Operation,
}

impl Operations {
    fn new(endpoints: &Endpoints) -> Self {
        let base = endpoints.base_url.as_str();
        Self {
            encrypt: Operation::post(OP_ENCRYPT, base, &endpoints.encrypt_route),
            decrypt: Operation::post(OP_DECRYPT, base, &endpoints.decrypt_route),
            import_key: Operation::post(OP_IMPORT_KEY, base, &endpoints.import_route),
            get_key_id: Operation::get(OP_GET_KEY_ID, base, &endpoints.get_key_id_route),
            csr_import: Operation::post(OP_CSR_IMPORT, base, &endpoints.csr_import_route),
            csr_status: Operation::get(OP_CSR_STATUS, base, &endpoints.csr_status_route),
        }
    }
}

/// Client of the DuoKey key-management service.
///
/// Every operation has a variant without a context, which never times out
/// beyond the HTTP client's own timeout, and a `*_with_context` variant.
#[derive(Debug, Clone)]
pub struct Kms {
    client: Client,
    operations: Arc<Operations>,
}

impl Kms {
    /// Create a facade over an authenticated client.
    #[must_use]
    pub fn new(client: Client, endpoints: &Endpoints) -> Self {
        Self {
            client,
            operations: Arc::new(Operations::new(endpoints)),
        }
    }

    /// Authenticate and create a facade.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::connect`].
    pub async fn connect(credentials: &Credentials, endpoints: &Endpoints) -> DuoKeyResult<Self> {
        Self::connect_with(credentials, endpoints, &HttpConfig::default()).await
    }

    /// Authenticate with custom HTTP settings and create a facade.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::connect_with`].
    pub async fn connect_with(
        credentials: &Credentials,
        endpoints: &Endpoints,
        config: &HttpConfig,
    ) -> DuoKeyResult<Self> {
        let client = Client::connect_with(credentials, config).await?;
        Ok(Self::new(client, endpoints))
    }

    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Encrypt a payload.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] before any request if the key or
    /// vault id is empty, and the executor's errors otherwise.
    pub async fn encrypt(&self, input: EncryptInput) -> DuoKeyResult<EncryptOutput> {
        self.encrypt_with_context(&CallContext::background(), input)
            .await
    }

    /// Encrypt a payload under `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Self::encrypt`].
    pub async fn encrypt_with_context(
        &self,
        ctx: &CallContext,
        input: EncryptInput,
    ) -> DuoKeyResult<EncryptOutput> {
        input.validate()?;
        self.call(ctx, &self.operations.encrypt, input).await
    }

    /// Decrypt a payload.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] before any request if the key or
    /// vault id is empty, and the executor's errors otherwise.
    pub async fn decrypt(&self, input: DecryptInput) -> DuoKeyResult<DecryptOutput> {
        self.decrypt_with_context(&CallContext::background(), input)
            .await
    }

    /// Decrypt a payload under `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Self::decrypt`].
    pub async fn decrypt_with_context(
        &self,
        ctx: &CallContext,
        input: DecryptInput,
    ) -> DuoKeyResult<DecryptOutput> {
        input.validate()?;
        self.call(ctx, &self.operations.decrypt, input).await
    }

    /// Import key material.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] before any request if an id or
    /// the key material is empty, and the executor's errors otherwise.
    pub async fn import_key(&self, input: ImportKeyInput) -> DuoKeyResult<ImportKeyOutput> {
        self.import_key_with_context(&CallContext::background(), input)
            .await
    }

    /// Import key material under `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Self::import_key`].
    pub async fn import_key_with_context(
        &self,
        ctx: &CallContext,
        input: ImportKeyInput,
    ) -> DuoKeyResult<ImportKeyOutput> {
        input.validate()?;
        self.call(ctx, &self.operations.import_key, input).await
    }

    /// Look up the key registered under an external id.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] before any request if the
    /// external id is empty, and the executor's errors otherwise.
    pub async fn get_key_id(&self, input: GetKeyIdInput) -> DuoKeyResult<GetKeyIdOutput> {
        self.get_key_id_with_context(&CallContext::background(), input)
            .await
    }

    /// Look up a key under `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Self::get_key_id`].
    pub async fn get_key_id_with_context(
        &self,
        ctx: &CallContext,
        input: GetKeyIdInput,
    ) -> DuoKeyResult<GetKeyIdOutput> {
        input.validate()?;
        self.call(ctx, &self.operations.get_key_id, input).await
    }

    /// Submit a certificate signing request.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] before any request if the CSR
    /// is empty, and the executor's errors otherwise.
    pub async fn csr_import(&self, input: CsrImportInput) -> DuoKeyResult<CsrImportOutput> {
        self.csr_import_with_context(&CallContext::background(), input)
            .await
    }

    /// Submit a CSR under `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Self::csr_import`].
    pub async fn csr_import_with_context(
        &self,
        ctx: &CallContext,
        input: CsrImportInput,
    ) -> DuoKeyResult<CsrImportOutput> {
        input.validate()?;
        self.call(ctx, &self.operations.csr_import, input).await
    }

    /// Fetch the status and certificate of a submitted CSR.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidInput`] before any request if the common
    /// name is empty, and the executor's errors otherwise.
    pub async fn csr_status(&self, input: CsrStatusInput) -> DuoKeyResult<CsrStatusOutput> {
        self.csr_status_with_context(&CallContext::background(), input)
            .await
    }

    /// Fetch CSR status under `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Self::csr_status`].
    pub async fn csr_status_with_context(
        &self,
        ctx: &CallContext,
        input: CsrStatusInput,
    ) -> DuoKeyResult<CsrStatusOutput> {
        input.validate()?;
        self.call(ctx, &self.operations.csr_status, input).await
    }

    #[instrument(skip_all, fields(operation = operation.name))]
    async fn call<P, R>(&self, ctx: &CallContext, operation: &Operation, input: P) -> DuoKeyResult<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Outcome,
    {
        if operation.route.is_empty() {
            return Err(DuoKeyError::invalid_config(format!(
                "no route configured for {}",
                operation.name
            )));
        }
        debug!(route = %operation.route, "Calling KMS");
        self.client.new_request(operation, Some(input)).send(ctx).await
    }
}

/// KMS operations as a trait, for substituting test doubles.
#[async_trait]
pub trait KmsApi: Send + Sync {
    /// Encrypt a payload.
    async fn encrypt(&self, ctx: &CallContext, input: EncryptInput) -> DuoKeyResult<EncryptOutput>;

    /// Decrypt a payload.
    async fn decrypt(&self, ctx: &CallContext, input: DecryptInput) -> DuoKeyResult<DecryptOutput>;

    /// Import key material.
    async fn import_key(
        &self,
        ctx: &CallContext,
        input: ImportKeyInput,
    ) -> DuoKeyResult<ImportKeyOutput>;

    /// Look up a key by external id.
    async fn get_key_id(
        &self,
        ctx: &CallContext,
        input: GetKeyIdInput,
    ) -> DuoKeyResult<GetKeyIdOutput>;

    /// Submit a CSR.
    async fn csr_import(
        &self,
        ctx: &CallContext,
        input: CsrImportInput,
    ) -> DuoKeyResult<CsrImportOutput>;

    /// Fetch CSR status.
    async fn csr_status(
        &self,
        ctx: &CallContext,
        input: CsrStatusInput,
    ) -> DuoKeyResult<CsrStatusOutput>;
}

#[async_trait]
impl KmsApi for Kms {
    async fn encrypt(&self, ctx: &CallContext, input: EncryptInput) -> DuoKeyResult<EncryptOutput> {
        self.encrypt_with_context(ctx, input).await
    }

    async fn decrypt(&self, ctx: &CallContext, input: DecryptInput) -> DuoKeyResult<DecryptOutput> {
        self.decrypt_with_context(ctx, input).await
    }

    async fn import_key(
        &self,
        ctx: &CallContext,
        input: ImportKeyInput,
    ) -> DuoKeyResult<ImportKeyOutput> {
        self.import_key_with_context(ctx, input).await
    }

    async fn get_key_id(
        &self,
        ctx: &CallContext,
        input: GetKeyIdInput,
    ) -> DuoKeyResult<GetKeyIdOutput> {
        self.get_key_id_with_context(ctx, input).await
    }

    async fn csr_import(
        &self,
        ctx: &CallContext,
        input: CsrImportInput,
    ) -> DuoKeyResult<CsrImportOutput> {
        self.csr_import_with_context(ctx, input).await
    }

    async fn csr_status(
        &self,
        ctx: &CallContext,
        input: CsrStatusInput,
    ) -> DuoKeyResult<CsrStatusOutput> {
        self.csr_status_with_context(ctx, input).await
    }
}

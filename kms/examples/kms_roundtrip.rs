//! Encrypts and decrypts a sample payload against a live DuoKey deployment.
//!
//! Configuration comes from `DUOKEY_*` variables (or a `.env` file), plus
//! `DUOKEY_VAULT_ID` and `DUOKEY_KEY_ID` naming the key to use.

use anyhow::{Context, Result};
use duokey::config::{process_env, required};
use duokey::{CallContext, Credentials, TracingConfig, init_tracing};
use duokey_kms::{DecryptInput, EncryptInput, Endpoints, GetKeyIdInput, Kms};
use std::time::{Duration, Instant};
use tracing::info;

const PLAINTEXT: &str = "Lorem ipsum dolor sit amet";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&TracingConfig::default().with_service_name("kms-roundtrip"));

    let credentials = Credentials::from_env().context("loading credentials")?;
    let endpoints = Endpoints::from_env().context("loading endpoints")?;
    let vault_id = required(&process_env, "DUOKEY_VAULT_ID")?;
    let key_id = required(&process_env, "DUOKEY_KEY_ID")?;
    let algorithm = process_env("DUOKEY_ALGORITHM").unwrap_or_else(|| "RSA-OAEP-256".to_string());

    let kms = Kms::connect(&credentials, &endpoints)
        .await
        .context("authenticating")?;

    let started = Instant::now();
    let ctx = CallContext::with_timeout(Duration::from_secs(10));

    let input = EncryptInput::new(&key_id, &vault_id, PLAINTEXT.as_bytes().to_vec())
        .with_algorithm(&algorithm)
        .with_context("appid", &credentials.app_id);
    let encrypted = kms.encrypt_with_context(&ctx, input).await.context("encrypt")?;
    let result = encrypted.result().context("encrypt returned no result")?;
    info!(bytes = result.ciphertext().len(), "Encrypted");

    let input = DecryptInput::from_encrypted(&vault_id, result)
        .with_algorithm(&algorithm)
        .with_context("appid", &credentials.app_id);
    let decrypted = kms.decrypt_with_context(&ctx, input).await.context("decrypt")?;
    let plaintext = decrypted
        .result()
        .map(|r| String::from_utf8_lossy(&r.payload).into_owned())
        .unwrap_or_default();
    info!(%plaintext, matches = plaintext == PLAINTEXT, "Decrypted");

    if !endpoints.get_key_id_route.is_empty() {
        let key = kms
            .get_key_id_with_context(&ctx, GetKeyIdInput::new(&key_id))
            .await
            .context("get key id")?;
        info!(name = ?key.result().map(|r| &r.key.name), "Resolved key");
    }

    info!(elapsed = ?started.elapsed(), "Operations complete");
    Ok(())
}

//! OAuth credential refresh (§4.1, §5, §6): the OAuth2 refresh-token grant plus at-rest
//! encryption of the sensitive fields a connector's `config` carries when marked
//! `_token_encrypted`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use chrono::{Duration, Utc};
use hkdf::Hkdf;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;

use crate::store::SearchSourceConnector;

const NONCE_LEN: usize = 12;

/// Encrypts/decrypts individual credential fields (`token`, `refresh_token`, `client_secret`)
/// within a connector's JSON `config` blob, keyed off one process-wide secret. The key is
/// derived via HKDF rather than used directly, so the raw `SECRET_KEY` value never touches
/// AES-GCM's key schedule.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn new(secret_key: &SecretString) -> Self {
        let hk = Hkdf::<Sha256>::new(None, secret_key.expose_secret().as_bytes());
        let mut key = [0u8; 32];
        hk.expand(b"connector-token-encryption", &mut key)
            .expect("32 bytes is a valid HKDF output length");
        Self {
            cipher: Aes256Gcm::new_from_slice(&key).expect("key is exactly 32 bytes"),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| e.to_string())?;
        let mut out = nonce.to_vec();
        out.extend(ciphertext);
        Ok(hex::encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, String> {
        let bytes = hex::decode(encoded).map_err(|e| e.to_string())?;
        if bytes.len() < NONCE_LEN {
            return Err("ciphertext too short".to_string());
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce = aes_gcm::Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| e.to_string())?;
        String::from_utf8(plaintext).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

fn config_field(config: &Value, key: &str, cipher: Option<&TokenCipher>) -> Result<Option<String>, String> {
    let raw = match config.get(key).and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => return Ok(None),
    };
    match cipher {
        Some(cipher) => cipher.decrypt(&raw).map(Some),
        None => Ok(Some(raw)),
    }
}

/// Performs the OAuth2 refresh-token grant against the connector's configured token endpoint
/// and returns the JSON patch to merge into `config`. Only `token`/`refresh_token`/`expiry` are
/// touched here — `selected_folders`/`selected_files`/other user-set options already in
/// `config` survive because the caller merges with `config || patch` rather than replacing it.
///
/// On a non-2xx response the raw error body is returned as `Err`; the caller inspects it for
/// `invalid_grant` to decide whether this is a user-actionable re-authentication case.
pub async fn refresh_oauth_credentials(
    client: &Client,
    connector: &SearchSourceConnector,
    cipher: &TokenCipher,
) -> Result<Value, String> {
    let config = &connector.config;
    let token_encrypted = config.get("_token_encrypted").and_then(Value::as_bool).unwrap_or(false);
    let decrypt_cipher = token_encrypted.then_some(cipher);

    let token_uri = config
        .get("token_uri")
        .and_then(Value::as_str)
        .unwrap_or("https://oauth2.googleapis.com/token")
        .to_string();
    let client_id =
        config_field(config, "client_id", decrypt_cipher)?.ok_or_else(|| "missing client_id".to_string())?;
    let client_secret = config_field(config, "client_secret", decrypt_cipher)?
        .ok_or_else(|| "missing client_secret".to_string())?;
    let refresh_token = config_field(config, "refresh_token", decrypt_cipher)?
        .ok_or_else(|| "missing refresh_token".to_string())?;

    let response = client
        .post(&token_uri)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    let body = response.text().await.map_err(|e| e.to_string())?;
    if !status.is_success() {
        // The OAuth provider's error body carries `"error": "invalid_grant"` verbatim on a
        // revoked/expired refresh token; the caller string-matches this the same way the
        // reference indexer does rather than parsing a vendor-specific error schema.
        return Err(body);
    }

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| e.to_string())?;

    let encrypt = |value: &str| -> Result<Value, String> {
        if token_encrypted {
            cipher.encrypt(value).map(|s| json!(s))
        } else {
            Ok(json!(value))
        }
    };

    let mut patch = serde_json::Map::new();
    patch.insert("token".to_string(), encrypt(&parsed.access_token)?);
    if let Some(refresh_token) = &parsed.refresh_token {
        patch.insert("refresh_token".to_string(), encrypt(refresh_token)?);
    }
    if let Some(expires_in) = parsed.expires_in {
        let expiry = Utc::now() + Duration::seconds(expires_in);
        patch.insert("expiry".to_string(), json!(expiry.to_rfc3339()));
    }
    if token_encrypted {
        patch.insert("_token_encrypted".to_string(), json!(true));
    }

    Ok(Value::Object(patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let cipher = TokenCipher::new(&SecretString::from("a test secret key".to_string()));
        let encrypted = cipher.encrypt("ya29.refresh-token-value").expect("encrypt");
        assert_ne!(encrypted, "ya29.refresh-token-value");
        let decrypted = cipher.decrypt(&encrypted).expect("decrypt");
        assert_eq!(decrypted, "ya29.refresh-token-value");
    }

    #[test]
    fn decrypt_rejects_truncated_ciphertext() {
        let cipher = TokenCipher::new(&SecretString::from("a test secret key".to_string()));
        assert!(cipher.decrypt("ab").is_err());
    }
}

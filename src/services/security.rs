use crate::constants::crypto::{IV_SIZE, KEY_SIZE, TAG_SIZE};
use crate::errors::ExecutionError;
use crate::utils::paths::resolve_key_path;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use base64::Engine;
use rand::RngCore;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

fn decode_key(raw: &str) -> Option<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.len() == KEY_SIZE * 2 {
        return hex::decode(trimmed).ok();
    }
    if trimmed.len() == KEY_SIZE {
        return Some(trimmed.as_bytes().to_vec());
    }
    if trimmed.len() > KEY_SIZE * 2 {
        let engine = base64::engine::general_purpose::STANDARD;
        return engine.decode(trimmed.as_bytes()).ok();
    }
    None
}

fn looks_encrypted(value: &str) -> bool {
    let parts: Vec<&str> = value.split(':').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// AES-256-GCM for credentials at rest. Wire format is
/// `<iv_hex>:<tag_hex>:<data_hex>`.
#[derive(Clone)]
pub struct Security {
    cipher: Aes256Gcm,
}

impl Security {
    pub fn new() -> Result<Self, ExecutionError> {
        let key_path = resolve_key_path();
        let secret_key = Self::load_or_create_secret(&key_path)?;
        Self::from_key(&secret_key)
    }

    pub fn from_key(key: &[u8]) -> Result<Self, ExecutionError> {
        if key.len() != KEY_SIZE {
            return Err(ExecutionError::invalid_argument(format!(
                "Encryption key must be {} bytes",
                KEY_SIZE
            )));
        }
        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    fn load_or_create_secret(path: &PathBuf) -> Result<Vec<u8>, ExecutionError> {
        if let Ok(raw) = std::env::var("ENCRYPTION_KEY") {
            if let Some(decoded) = decode_key(&raw) {
                return Ok(decoded);
            }
        }

        if path.exists() {
            if let Ok(stored) = fs::read_to_string(path) {
                if let Some(decoded) = decode_key(&stored) {
                    return Ok(decoded);
                }
            }
        }

        let mut generated = vec![0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut generated);
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(mut file) = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
        {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
            }
            let _ = file.write_all(hex::encode(&generated).as_bytes());
        }
        Ok(generated)
    }

    pub fn encrypt(&self, text: &str) -> Result<String, ExecutionError> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        let nonce = aes_gcm::Nonce::from_slice(&iv);
        let mut ciphertext = self
            .cipher
            .encrypt(nonce, text.as_bytes())
            .map_err(|_| ExecutionError::internal("Failed to encrypt credential payload"))?;
        if ciphertext.len() < TAG_SIZE {
            return Err(ExecutionError::internal(
                "Failed to encrypt credential payload",
            ));
        }
        let tag = ciphertext.split_off(ciphertext.len() - TAG_SIZE);
        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, payload: &str) -> Result<String, ExecutionError> {
        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() != 3 {
            return Err(
                ExecutionError::invalid_argument("Invalid encrypted payload format")
                    .with_hint("Expected format: \"<iv_hex>:<tag_hex>:<data_hex>\".".to_string()),
            );
        }
        let iv = hex::decode(parts[0])
            .map_err(|_| ExecutionError::invalid_argument("Invalid encrypted payload format"))?;
        let tag = hex::decode(parts[1])
            .map_err(|_| ExecutionError::invalid_argument("Invalid encrypted payload format"))?;
        let data = hex::decode(parts[2])
            .map_err(|_| ExecutionError::invalid_argument("Invalid encrypted payload format"))?;
        if tag.len() != TAG_SIZE {
            return Err(ExecutionError::invalid_argument("Invalid auth tag length"));
        }
        let mut combined = Vec::with_capacity(data.len() + tag.len());
        combined.extend_from_slice(&data);
        combined.extend_from_slice(&tag);
        let nonce = aes_gcm::Nonce::from_slice(&iv);
        let decrypted = self.cipher.decrypt(nonce, combined.as_ref()).map_err(|_| {
            ExecutionError::internal("Failed to decrypt credential payload").with_hint(
                "Ensure ENCRYPTION_KEY (or the persisted key file) matches the one used to encrypt stored credentials.".to_string(),
            )
        })?;
        Ok(String::from_utf8_lossy(&decrypted).to_string())
    }

    /// Values that do not carry the `iv:tag:data` shape are treated as
    /// plaintext and passed through.
    pub fn decrypt_if_encrypted(&self, value: &str) -> Result<String, ExecutionError> {
        if looks_encrypted(value) {
            self.decrypt(value)
        } else {
            Ok(value.to_string())
        }
    }
}

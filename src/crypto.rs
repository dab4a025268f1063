//! National-id protection helpers
//!
//! The real encrypt/decrypt primitive lives in an external service; this
//! module defines its call contract plus the masking and validation rules
//! applied around it. A keyed reference implementation backs tests and the
//! fixture demo.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

use crate::models::EncryptedString;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext is malformed: {0}")]
    Malformed(String),

    #[error("encryption service unavailable: {0}")]
    Unavailable(String),
}

/// External encryption primitive.
///
/// `decrypt` failures must be caught by callers and converted to a
/// display-safe marker; they never abort a surrounding batch.
pub trait EncryptionService: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedString, CryptoError>;
    fn decrypt(&self, ciphertext: &EncryptedString) -> Result<String, CryptoError>;
}

/// Keyed XOR + base64 reference cipher.
///
/// Stands in for the external service in tests and the demo binary. Not a
/// real cipher; the production primitive is swapped in behind the trait.
pub struct KeyedCipher {
    key: Vec<u8>,
}

impl KeyedCipher {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.as_bytes().to_vec(),
        }
    }

    fn xor(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

impl EncryptionService for KeyedCipher {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedString, CryptoError> {
        if self.key.is_empty() {
            return Err(CryptoError::Unavailable("empty key".to_string()));
        }
        Ok(EncryptedString::new(BASE64.encode(self.xor(plaintext.as_bytes()))))
    }

    fn decrypt(&self, ciphertext: &EncryptedString) -> Result<String, CryptoError> {
        if self.key.is_empty() {
            return Err(CryptoError::Unavailable("empty key".to_string()));
        }
        let raw = BASE64
            .decode(ciphertext.as_str())
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        String::from_utf8(self.xor(&raw))
            .map_err(|_| CryptoError::Malformed("not valid utf-8 after decryption".to_string()))
    }
}

/// Check-digit weights for the 13-digit national identification number
const CHECK_WEIGHTS: [u32; 12] = [2, 3, 4, 5, 6, 7, 8, 9, 2, 3, 4, 5];

/// Validate a plaintext national identification number.
///
/// Accepts the `YYMMDD-GXXXXXX` form with or without the dash: 13 digits,
/// plausible birth date, gender code 1-4, weighted checksum.
pub fn validate_national_id(value: &str) -> bool {
    let cleaned: String = value.chars().filter(|c| *c != '-').collect();
    if cleaned.len() != 13 || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = cleaned.chars().map(|c| c.to_digit(10).unwrap()).collect();

    let month = digits[2] * 10 + digits[3];
    let day = digits[4] * 10 + digits[5];
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return false;
    }

    let gender = digits[6];
    if !(1..=4).contains(&gender) {
        return false;
    }

    let sum: u32 = digits[..12]
        .iter()
        .zip(CHECK_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    (11 - (sum % 11)) % 10 == digits[12]
}

/// Mask a plaintext national id for operator display: `YYMMDD-G******`.
///
/// Values that are not the expected 13 digits are returned unchanged.
pub fn mask_national_id(value: &str) -> String {
    let cleaned: String = value.chars().filter(|c| *c != '-').collect();
    if cleaned.len() != 13 {
        return value.to_string();
    }
    format!("{}-{}******", &cleaned[..6], &cleaned[6..7])
}

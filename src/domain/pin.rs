use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Salted SHA-256 digest of an account PIN.
///
/// Encoded as `sha256$<salt hex>$<digest hex>` wherever it is persisted.
/// The plaintext PIN is never kept.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PinHash {
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl PinHash {
    /// Hash a PIN under a fresh random salt.
    pub fn new(pin: &str) -> Self {
        let salt: [u8; SALT_LEN] = rand::thread_rng().r#gen();
        Self::with_salt(pin, &salt)
    }

    fn with_salt(pin: &str, salt: &[u8]) -> Self {
        Self {
            salt: salt.to_vec(),
            digest: digest(salt, pin),
        }
    }

    /// Returns true if `pin` hashes to the stored digest under the stored salt.
    pub fn verify(&self, pin: &str) -> bool {
        let candidate = digest(&self.salt, pin);
        // Compare every byte so timing does not depend on the mismatch position.
        candidate.len() == self.digest.len()
            && candidate
                .iter()
                .zip(&self.digest)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    pub fn encode(&self) -> String {
        format!(
            "{}${}${}",
            SCHEME,
            hex::encode(&self.salt),
            hex::encode(&self.digest)
        )
    }

    pub fn decode(encoded: &str) -> Result<Self, PinHashError> {
        let mut parts = encoded.split('$');
        let (Some(scheme), Some(salt), Some(digest), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(PinHashError::Malformed);
        };
        if scheme != SCHEME {
            return Err(PinHashError::UnknownScheme(scheme.to_string()));
        }

        let salt = hex::decode(salt).map_err(|_| PinHashError::Malformed)?;
        let digest = hex::decode(digest).map_err(|_| PinHashError::Malformed)?;
        if salt.is_empty() || digest.len() != 32 {
            return Err(PinHashError::Malformed);
        }
        Ok(Self { salt, digest })
    }
}

fn digest(salt: &[u8], pin: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(pin.as_bytes());
    hasher.finalize().to_vec()
}

// Never print the digest, even in debug output.
impl fmt::Debug for PinHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PinHash(..)")
    }
}

impl From<PinHash> for String {
    fn from(hash: PinHash) -> Self {
        hash.encode()
    }
}

impl TryFrom<String> for PinHash {
    type Error = PinHashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PinHash::decode(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinHashError {
    Malformed,
    UnknownScheme(String),
}

impl fmt::Display for PinHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinHashError::Malformed => write!(f, "malformed PIN hash"),
            PinHashError::UnknownScheme(s) => write!(f, "unknown PIN hash scheme: {}", s),
        }
    }
}

impl std::error::Error for PinHashError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_matches_only_the_original_pin() {
        let hash = PinHash::new("1234");
        assert!(hash.verify("1234"));
        assert!(!hash.verify("1235"));
        assert!(!hash.verify(""));
        assert!(!hash.verify("12345"));
    }

    #[test]
    fn test_salts_differ_between_hashes() {
        let a = PinHash::new("1234");
        let b = PinHash::new("1234");
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_known_digest() {
        let hash = PinHash::with_salt("1234", b"salt");
        let expected = hex::encode(Sha256::digest(b"salt1234"));
        assert_eq!(hash.encode(), format!("sha256${}${}", hex::encode(b"salt"), expected));
    }

    #[test]
    fn test_encoded_form_survives_decode() {
        let hash = PinHash::new("9876");
        let decoded = PinHash::decode(&hash.encode()).unwrap();
        assert_eq!(decoded, hash);
        assert!(decoded.verify("9876"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(PinHash::decode("1234"), Err(PinHashError::Malformed));
        assert_eq!(PinHash::decode("sha256$zz$00"), Err(PinHashError::Malformed));
        assert_eq!(PinHash::decode("sha256$00$00"), Err(PinHashError::Malformed));
        assert!(matches!(
            PinHash::decode("md5$00$00"),
            Err(PinHashError::UnknownScheme(_))
        ));
    }

    #[test]
    fn test_debug_hides_digest() {
        let hash = PinHash::new("1234");
        assert_eq!(format!("{:?}", hash), "PinHash(..)");
    }
}

use hmac_sha512::sha384 as hmac_sha384;
use rand::RngCore;
use serde_json::{Map, Value};
use zeroize::{Zeroize, Zeroizing};

use super::{Family, HS256, HS384, HS512};
use crate::common::*;
use crate::error::*;
use crate::key::*;

/// Prefixes of encoded asymmetric keys and certificates, never accepted as HMAC secrets.
const INVALID_SECRET_PREFIXES: &[&str] = &[
    "-----BEGIN PUBLIC KEY-----",
    "-----BEGIN RSA PUBLIC KEY-----",
    "-----BEGIN CERTIFICATE-----",
    "-----BEGIN EC PUBLIC KEY-----",
    "ssh-rsa",
    "ssh-ed25519",
    "ecdsa-sha2-",
];

#[derive(Clone)]
pub struct HMACKey {
    algorithm: &'static str,
    raw_key: Vec<u8>,
    key_id: Option<String>,
}

impl std::fmt::Debug for HMACKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HMACKey")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Drop for HMACKey {
    fn drop(&mut self) {
        self.raw_key.zeroize();
    }
}

impl HMACKey {
    pub fn new(key_data: &KeyData, algorithm: &str) -> Result<Self, Error> {
        let algorithm = static_algorithm(algorithm)?;
        match key_data {
            KeyData::Raw(raw) => {
                if let Some(text) = key_data.as_text() {
                    ensure!(
                        !INVALID_SECRET_PREFIXES
                            .iter()
                            .any(|prefix| text.starts_with(prefix)),
                        JWTError::key(
                            "the specified key is an asymmetric key or certificate and must not be used as an HMAC secret"
                        )
                    );
                }
                Self::from_bytes_for(raw, algorithm)
            }
            KeyData::Jwk(jwk) => {
                check_jwk(jwk, "oct", algorithm)?;
                let raw_key = Zeroizing::new(jwk_member(jwk, "k")?);
                let mut key = Self::from_bytes_for(&raw_key, algorithm)?;
                key.key_id = key_data.key_id().map(str::to_string);
                Ok(key)
            }
        }
    }

    /// Create a HMAC key from a byte slice.
    pub fn from_bytes(raw_key: &[u8], algorithm: &str) -> Result<Self, Error> {
        Self::from_bytes_for(raw_key, static_algorithm(algorithm)?)
    }

    fn from_bytes_for(raw_key: &[u8], algorithm: &'static str) -> Result<Self, Error> {
        ensure!(!raw_key.is_empty(), JWTError::key("empty HMAC secret"));
        Ok(HMACKey {
            algorithm,
            raw_key: raw_key.to_vec(),
            key_id: None,
        })
    }

    /// Generate a random HMAC key, as long as the digest.
    pub fn generate(algorithm: &str) -> Result<Self, Error> {
        let algorithm = static_algorithm(algorithm)?;
        let len = match algorithm {
            HS256 => 32,
            HS384 => 48,
            _ => 64,
        };
        let mut raw_key = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut raw_key);
        Ok(HMACKey {
            algorithm,
            raw_key,
            key_id: None,
        })
    }

    pub fn with_key_id(mut self, key_id: &str) -> Self {
        self.key_id = Some(key_id.to_string());
        self
    }

    /// Convert the HMAC key to a byte slice.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.raw_key.clone()
    }

    fn authentication_tag(&self, authenticated: &[u8]) -> Vec<u8> {
        match self.algorithm {
            HS256 => hmac_sha256::HMAC::mac(authenticated, &self.raw_key).to_vec(),
            HS384 => hmac_sha384::HMAC::mac(authenticated, &self.raw_key).to_vec(),
            _ => hmac_sha512::HMAC::mac(authenticated, &self.raw_key).to_vec(),
        }
    }
}

fn static_algorithm(algorithm: &str) -> Result<&'static str, Error> {
    check_family(Family::Hmac, algorithm)?;
    Ok(match algorithm {
        HS256 => HS256,
        HS384 => HS384,
        _ => HS512,
    })
}

impl JoseKey for HMACKey {
    fn algorithm(&self) -> &str {
        self.algorithm
    }

    fn sign(&self, signing_input: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.authentication_tag(signing_input))
    }

    fn verify(&self, signing_input: &[u8], signature: &[u8]) -> bool {
        ct_codecs::verify(&self.authentication_tag(signing_input), signature)
    }

    fn is_public(&self) -> bool {
        false
    }

    fn public_key(&self) -> Result<Key, Error> {
        bail!(JWTError::key("HMAC keys have no public component"))
    }

    fn to_dict(&self) -> Result<Map<String, Value>, Error> {
        let mut jwk = jwk_template("oct", self.algorithm, self.key_id.as_deref());
        jwk.insert("k".to_string(), Value::from(base64url_encode(&self.raw_key)));
        Ok(jwk)
    }
}

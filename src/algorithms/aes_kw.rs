//! AES Key Wrap keys (RFC 3394), for the A128KW, A192KW and A256KW algorithms.

#[cfg(any(feature = "pure-rust", target_arch = "wasm32", target_arch = "wasm64"))]
use superboring as boring;

use boring::aes::{unwrap_key, wrap_key, AesKey};
use rand::RngCore;
use serde_json::{Map, Value};
use zeroize::{Zeroize, Zeroizing};

use super::{Family, A128KW, A192KW, A256KW};
use crate::common::*;
use crate::error::*;
use crate::key::*;

/// A symmetric key-encryption key.
///
/// These keys only wrap and unwrap content encryption keys; they never sign.
#[derive(Clone)]
pub struct AESKey {
    algorithm: &'static str,
    key: Vec<u8>,
    key_id: Option<String>,
}

impl std::fmt::Debug for AESKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AESKey")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Drop for AESKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl AESKey {
    pub fn new(key_data: &KeyData, algorithm: &str) -> Result<Self, Error> {
        let (algorithm, key_size) = static_algorithm(algorithm)?;
        let mut key = match key_data {
            KeyData::Raw(raw) => {
                check_key_size(raw, algorithm, key_size)?;
                Zeroizing::new(raw.clone())
            }
            KeyData::Jwk(jwk) => {
                check_jwk(jwk, "oct", algorithm)?;
                let key = Zeroizing::new(jwk_member(jwk, "k")?);
                check_key_size(&key, algorithm, key_size)?;
                key
            }
        };
        Ok(AESKey {
            algorithm,
            key: std::mem::take(&mut *key),
            key_id: key_data.key_id().map(str::to_string),
        })
    }

    /// Generate a random key.
    pub fn generate(algorithm: &str) -> Result<Self, Error> {
        let (algorithm, key_size) = static_algorithm(algorithm)?;
        let mut key = vec![0u8; key_size];
        rand::thread_rng().fill_bytes(&mut key);
        Ok(AESKey {
            algorithm,
            key,
            key_id: None,
        })
    }

    /// Export the key as raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.key.clone()
    }
}

fn check_key_size(key: &[u8], algorithm: &str, key_size: usize) -> Result<(), Error> {
    ensure!(
        key.len() == key_size,
        JWTError::key(format!("{} requires a {}-byte key", algorithm, key_size))
    );
    Ok(())
}

fn static_algorithm(algorithm: &str) -> Result<(&'static str, usize), Error> {
    check_family(Family::Aes, algorithm)?;
    Ok(match algorithm {
        A128KW => (A128KW, 16),
        A192KW => (A192KW, 24),
        _ => (A256KW, 32),
    })
}

impl JoseKey for AESKey {
    fn algorithm(&self) -> &str {
        self.algorithm
    }

    fn sign(&self, _signing_input: &[u8]) -> Result<Vec<u8>, Error> {
        bail!(JWTError::key(format!(
            "{} is a key wrapping algorithm",
            self.algorithm
        )))
    }

    fn verify(&self, _signing_input: &[u8], _signature: &[u8]) -> bool {
        false
    }

    fn is_public(&self) -> bool {
        false
    }

    fn public_key(&self) -> Result<Key, Error> {
        bail!(JWTError::key("AES keys have no public component"))
    }

    fn to_dict(&self) -> Result<Map<String, Value>, Error> {
        let mut jwk = jwk_template("oct", self.algorithm, self.key_id.as_deref());
        jwk.insert("k".to_string(), Value::from(base64url_encode(&self.key)));
        Ok(jwk)
    }

    fn wrap_key(&self, cek: &[u8]) -> Result<Vec<u8>, Error> {
        ensure!(
            cek.len() >= 16 && cek.len() % 8 == 0,
            JWTError::key("the key to wrap must be a multiple of 8 bytes, at least 16")
        );
        let aes_key = AesKey::new_encrypt(&self.key).map_err(|_| JWTError::key("invalid AES key"))?;

        // Output is 8 bytes larger than input (for IV)
        let mut wrapped = vec![0u8; cek.len() + 8];
        wrap_key(&aes_key, None, &mut wrapped, cek)
            .map_err(|_| JWTError::key("key wrapping failed"))?;
        Ok(wrapped)
    }

    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, Error> {
        ensure!(
            wrapped.len() >= 24 && wrapped.len() % 8 == 0,
            JWTError::key("invalid wrapped key length")
        );
        let aes_key = AesKey::new_decrypt(&self.key).map_err(|_| JWTError::key("invalid AES key"))?;

        let mut cek = vec![0u8; wrapped.len() - 8];
        unwrap_key(&aes_key, None, &mut cek, wrapped)
            .map_err(|_| JWTError::key("key unwrapping failed"))?;
        Ok(cek)
    }
}

#[cfg(test)]
mod tests {
    use ct_codecs::{Decoder, Hex};

    use super::*;

    fn unhex(hex: &str) -> Vec<u8> {
        Hex::decode_to_vec(hex, None).unwrap()
    }

    #[test]
    fn rfc3394_vector() {
        let kek = unhex("000102030405060708090A0B0C0D0E0F");
        let key = AESKey::new(&KeyData::Raw(kek), "A128KW").unwrap();
        let cek = unhex("00112233445566778899AABBCCDDEEFF");
        let wrapped = key.wrap_key(&cek).unwrap();
        assert_eq!(
            wrapped,
            unhex("1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5")
        );
        assert_eq!(key.unwrap_key(&wrapped).unwrap(), cek);
    }

    #[test]
    fn unwrap_with_wrong_key() {
        let key = AESKey::generate("A256KW").unwrap();
        let other = AESKey::generate("A256KW").unwrap();
        let wrapped = key.wrap_key(&[7u8; 32]).unwrap();
        assert_eq!(wrapped.len(), 40);
        assert!(other.unwrap_key(&wrapped).is_err());
        assert!(key.unwrap_key(&wrapped[..16]).is_err());
    }

    #[test]
    fn key_sizes() {
        assert!(AESKey::new(&KeyData::Raw(vec![0u8; 24]), "A192KW").is_ok());
        assert!(AESKey::new(&KeyData::Raw(vec![0u8; 16]), "A192KW").is_err());
        assert!(AESKey::new(&KeyData::Raw(vec![0u8; 32]), "HS256").is_err());
    }

    #[test]
    fn jwk_key_size() {
        let mut jwk = AESKey::generate("A256KW").unwrap().to_dict().unwrap();
        jwk.remove("alg");
        assert!(AESKey::new(&KeyData::Jwk(jwk.clone()), "A256KW").is_ok());
        let err = AESKey::new(&KeyData::Jwk(jwk), "A128KW").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JWTError>(),
            Some(JWTError::KeyConstruction(_))
        ));
    }

    #[test]
    fn not_a_signing_key() {
        let key = AESKey::generate("A128KW").unwrap();
        assert!(key.sign(b"test").is_err());
        assert!(!key.verify(b"test", b""));
        assert!(key.public_key().is_err());
        let jwk = key.to_dict().unwrap();
        assert_eq!(jwk["kty"], "oct");
        let again = AESKey::new(&KeyData::Jwk(jwk), "A128KW").unwrap();
        assert_eq!(again.to_bytes(), key.to_bytes());
    }
}

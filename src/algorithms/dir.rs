use serde_json::{Map, Value};
use zeroize::Zeroize;

use super::{Family, DIR};
use crate::common::*;
use crate::error::*;
use crate::key::*;

/// A shared symmetric key used directly as the content encryption key.
///
/// Nothing is wrapped: `wrap_key` yields an empty encrypted key and
/// `unwrap_key` hands back the key itself. Signatures are always empty.
#[derive(Clone)]
pub struct DIRKey {
    key: Vec<u8>,
    key_id: Option<String>,
}

impl std::fmt::Debug for DIRKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DIRKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Drop for DIRKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl DIRKey {
    pub fn new(key_data: &KeyData, algorithm: &str) -> Result<Self, Error> {
        check_family(Family::Dir, algorithm)?;
        let key = match key_data {
            KeyData::Raw(raw) => raw.clone(),
            KeyData::Jwk(jwk) => {
                check_jwk(jwk, "oct", algorithm)?;
                jwk_member(jwk, "k")?
            }
        };
        Ok(DIRKey {
            key,
            key_id: key_data.key_id().map(str::to_string),
        })
    }
}

impl JoseKey for DIRKey {
    fn algorithm(&self) -> &str {
        DIR
    }

    fn sign(&self, _signing_input: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(Vec::new())
    }

    fn verify(&self, _signing_input: &[u8], signature: &[u8]) -> bool {
        signature.is_empty()
    }

    fn is_public(&self) -> bool {
        false
    }

    fn public_key(&self) -> Result<Key, Error> {
        bail!(JWTError::key("direct keys have no public component"))
    }

    fn to_dict(&self) -> Result<Map<String, Value>, Error> {
        let mut jwk = Map::new();
        jwk.insert("kty".to_string(), Value::from("oct"));
        jwk.insert("k".to_string(), Value::from(base64url_encode(&self.key)));
        if let Some(key_id) = &self.key_id {
            jwk.insert("kid".to_string(), Value::from(key_id.as_str()));
        }
        Ok(jwk)
    }

    fn wrap_key(&self, _cek: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(Vec::new())
    }

    fn unwrap_key(&self, _wrapped: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.key.clone())
    }
}

#[test]
fn direct_key() {
    let key = DIRKey::new(&"shared".into(), "dir").unwrap();
    assert_eq!(key.algorithm(), "dir");
    assert!(key.sign(b"anything").unwrap().is_empty());
    assert!(key.verify(b"anything", b""));
    assert!(!key.verify(b"anything", b"x"));
    assert!(key.wrap_key(b"cek").unwrap().is_empty());
    assert_eq!(key.unwrap_key(b"").unwrap(), b"shared");

    let jwk = key.to_dict().unwrap();
    assert_eq!(jwk["kty"], "oct");
    assert_eq!(jwk["k"], base64url_encode("shared"));
    assert!(DIRKey::new(&"shared".into(), "A128KW").is_err());
}

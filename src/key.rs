use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::algorithms::*;
use crate::common::*;
use crate::error::*;

/// Raw key material, as supplied by the caller.
#[derive(Clone)]
pub enum KeyData {
    /// A shared secret, or an encoded (PEM or DER) key or certificate
    Raw(Vec<u8>),
    /// A single JSON Web Key
    Jwk(Map<String, Value>),
}

impl fmt::Debug for KeyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyData::Raw(raw) => f
                .debug_tuple("Raw")
                .field(&format_args!("{} bytes", raw.len()))
                .finish(),
            KeyData::Jwk(jwk) => f
                .debug_struct("Jwk")
                .field("kty", &jwk.get("kty"))
                .field("kid", &jwk.get("kid"))
                .finish_non_exhaustive(),
        }
    }
}

impl KeyData {
    /// The "alg" member of a JWK, if any.
    pub fn algorithm(&self) -> Option<&str> {
        match self {
            KeyData::Jwk(jwk) => jwk.get("alg").and_then(Value::as_str),
            KeyData::Raw(_) => None,
        }
    }

    /// The "kid" member of a JWK, if any.
    pub fn key_id(&self) -> Option<&str> {
        match self {
            KeyData::Jwk(jwk) => jwk.get("kid").and_then(Value::as_str),
            KeyData::Raw(_) => None,
        }
    }

    pub(crate) fn as_text(&self) -> Option<&str> {
        match self {
            KeyData::Raw(raw) => std::str::from_utf8(raw).ok().map(str::trim),
            KeyData::Jwk(_) => None,
        }
    }
}

impl From<&str> for KeyData {
    fn from(secret: &str) -> Self {
        KeyData::Raw(secret.as_bytes().to_vec())
    }
}

impl From<String> for KeyData {
    fn from(secret: String) -> Self {
        KeyData::Raw(secret.into_bytes())
    }
}

impl From<&[u8]> for KeyData {
    fn from(raw: &[u8]) -> Self {
        KeyData::Raw(raw.to_vec())
    }
}

impl From<Vec<u8>> for KeyData {
    fn from(raw: Vec<u8>) -> Self {
        KeyData::Raw(raw)
    }
}

impl From<Map<String, Value>> for KeyData {
    fn from(jwk: Map<String, Value>) -> Self {
        KeyData::Jwk(jwk)
    }
}

/// What every key, built-in or registered, can do.
pub trait JoseKey: Send + Sync + fmt::Debug {
    /// The algorithm this key was constructed for.
    fn algorithm(&self) -> &str;

    /// Sign `signing_input`. Fails if no private material is present.
    fn sign(&self, signing_input: &[u8]) -> Result<Vec<u8>, Error>;

    /// Check a signature. A mismatch is `false`, never an error.
    fn verify(&self, signing_input: &[u8], signature: &[u8]) -> bool;

    /// Whether the key only holds public material.
    fn is_public(&self) -> bool;

    /// A key holding only the public components.
    fn public_key(&self) -> Result<Key, Error>;

    /// The JWK representation. Private members are only present for private keys.
    fn to_dict(&self) -> Result<Map<String, Value>, Error>;

    /// Encrypt a content encryption key.
    fn wrap_key(&self, _cek: &[u8]) -> Result<Vec<u8>, Error> {
        bail!(JWTError::key(format!(
            "{} keys cannot wrap keys",
            self.algorithm()
        )))
    }

    /// Decrypt a content encryption key.
    fn unwrap_key(&self, _wrapped: &[u8]) -> Result<Vec<u8>, Error> {
        bail!(JWTError::key(format!(
            "{} keys cannot unwrap keys",
            self.algorithm()
        )))
    }
}

/// A key, for any supported algorithm.
#[derive(Clone, Debug)]
pub enum Key {
    Hmac(HMACKey),
    Rsa(RSAKey),
    Ec(ECKey),
    Aes(AESKey),
    Dir(DIRKey),
    /// A key produced by a factory registered with `register_key()`
    Custom(Arc<dyn JoseKey>),
}

impl Key {
    /// The built-in family of this key, `None` for registered keys.
    pub fn family(&self) -> Option<Family> {
        match self {
            Key::Hmac(_) => Some(Family::Hmac),
            Key::Rsa(_) => Some(Family::Rsa),
            Key::Ec(_) => Some(Family::Ec),
            Key::Aes(_) => Some(Family::Aes),
            Key::Dir(_) => Some(Family::Dir),
            Key::Custom(_) => None,
        }
    }

    fn inner(&self) -> &dyn JoseKey {
        match self {
            Key::Hmac(key) => key,
            Key::Rsa(key) => key,
            Key::Ec(key) => key,
            Key::Aes(key) => key,
            Key::Dir(key) => key,
            Key::Custom(key) => key.as_ref(),
        }
    }
}

impl JoseKey for Key {
    fn algorithm(&self) -> &str {
        self.inner().algorithm()
    }

    fn sign(&self, signing_input: &[u8]) -> Result<Vec<u8>, Error> {
        self.inner().sign(signing_input)
    }

    fn verify(&self, signing_input: &[u8], signature: &[u8]) -> bool {
        self.inner().verify(signing_input, signature)
    }

    fn is_public(&self) -> bool {
        self.inner().is_public()
    }

    fn public_key(&self) -> Result<Key, Error> {
        self.inner().public_key()
    }

    fn to_dict(&self) -> Result<Map<String, Value>, Error> {
        self.inner().to_dict()
    }

    fn wrap_key(&self, cek: &[u8]) -> Result<Vec<u8>, Error> {
        self.inner().wrap_key(cek)
    }

    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, Error> {
        self.inner().unwrap_key(wrapped)
    }
}

/// Check the shape of a JWK before a family parses its members.
pub(crate) fn check_jwk(jwk: &Map<String, Value>, kty: &str, algorithm: &str) -> Result<(), Error> {
    match jwk.get("kty").and_then(Value::as_str) {
        Some(found) if found == kty => {}
        Some(found) => bail!(JWTError::key(format!(
            "expected a {} key, got kty {}",
            kty, found
        ))),
        None => bail!(JWTError::key("missing kty member")),
    }
    if let Some(alg) = jwk.get("alg").and_then(Value::as_str) {
        ensure!(
            alg == algorithm,
            JWTError::key(format!(
                "key is for {}, not {}",
                alg, algorithm
            ))
        );
    }
    Ok(())
}

/// A base64url-encoded JWK member.
pub(crate) fn jwk_member(jwk: &Map<String, Value>, name: &str) -> Result<Vec<u8>, Error> {
    let encoded = jwk
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| JWTError::key(format!("missing {} member", name)))?;
    base64url_decode(encoded)
        .map_err(|_| JWTError::key(format!("invalid {} member", name)).into())
}

pub(crate) fn optional_jwk_member(
    jwk: &Map<String, Value>,
    name: &str,
) -> Result<Option<Vec<u8>>, Error> {
    if jwk.contains_key(name) {
        jwk_member(jwk, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Start a JWK with the members every family shares.
pub(crate) fn jwk_template(kty: &str, algorithm: &str, key_id: Option<&str>) -> Map<String, Value> {
    let mut jwk = Map::new();
    jwk.insert("alg".to_string(), Value::from(algorithm));
    jwk.insert("kty".to_string(), Value::from(kty));
    if let Some(key_id) = key_id {
        jwk.insert("kid".to_string(), Value::from(key_id));
    }
    jwk
}

/// Refuse to construct a key for an algorithm outside the family.
pub(crate) fn check_family(family: Family, algorithm: &str) -> Result<(), Error> {
    ensure!(
        family.algorithms().contains(&algorithm),
        JWTError::key(format!(
            "{} is not a {:?} algorithm",
            algorithm, family
        ))
    );
    Ok(())
}

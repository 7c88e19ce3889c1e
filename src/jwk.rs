//! Algorithm registry and key construction.
//!
//! Built-in families are resolved from the algorithm identifier. Factories
//! registered at runtime take precedence over them, which allows replacing a
//! built-in implementation or adding a new algorithm.
//!
//! Registration is process-wide. Lookups are safe from any thread; callers
//! registering the same identifier concurrently must order those calls
//! themselves.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::algorithms::*;
use crate::error::*;
use crate::key::*;

/// Builds a key for an algorithm from caller-supplied material.
pub type KeyFactory = Arc<dyn Fn(&KeyData, &str) -> Result<Key, Error> + Send + Sync>;

static REGISTERED_KEYS: Lazy<RwLock<HashMap<String, KeyFactory>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// How keys for a given algorithm are constructed.
#[derive(Clone)]
pub enum KeyConstructor {
    Registered(KeyFactory),
    Builtin(Family),
}

impl fmt::Debug for KeyConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyConstructor::Registered(_) => f.write_str("Registered"),
            KeyConstructor::Builtin(family) => f.debug_tuple("Builtin").field(family).finish(),
        }
    }
}

impl KeyConstructor {
    pub fn construct(&self, key_data: &KeyData, algorithm: &str) -> Result<Key, Error> {
        match self {
            KeyConstructor::Registered(factory) => factory(key_data, algorithm),
            KeyConstructor::Builtin(Family::Hmac) => Ok(Key::Hmac(HMACKey::new(key_data, algorithm)?)),
            KeyConstructor::Builtin(Family::Rsa) => Ok(Key::Rsa(RSAKey::new(key_data, algorithm)?)),
            KeyConstructor::Builtin(Family::Ec) => Ok(Key::Ec(ECKey::new(key_data, algorithm)?)),
            KeyConstructor::Builtin(Family::Aes) => Ok(Key::Aes(AESKey::new(key_data, algorithm)?)),
            KeyConstructor::Builtin(Family::Dir) => Ok(Key::Dir(DIRKey::new(key_data, algorithm)?)),
        }
    }
}

fn registered_factory(algorithm: &str) -> Option<KeyFactory> {
    REGISTERED_KEYS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(algorithm)
        .cloned()
}

/// Find how to build keys for `algorithm`.
///
/// Registered factories come first, then the HMAC, RSA, EC and AES
/// families, then the "dir" identifier.
pub fn get_key(algorithm: &str) -> Option<KeyConstructor> {
    if let Some(factory) = registered_factory(algorithm) {
        return Some(KeyConstructor::Registered(factory));
    }
    Family::of(algorithm).map(KeyConstructor::Builtin)
}

/// Register a key factory for `algorithm`, replacing any previous one.
///
/// The factory must produce a type implementing [`JoseKey`], so that keys it
/// builds can be used everywhere a built-in key can.
pub fn register_key<K, F>(algorithm: &str, factory: F) -> Result<(), Error>
where
    K: JoseKey + 'static,
    F: Fn(&KeyData, &str) -> Result<K, Error> + Send + Sync + 'static,
{
    ensure!(
        !algorithm.is_empty(),
        JWTError::UnknownAlgorithm("empty algorithm identifier".to_string())
    );
    let factory: KeyFactory = Arc::new(move |key_data: &KeyData, algorithm: &str| {
        let key = factory(key_data, algorithm)?;
        Ok(Key::Custom(Arc::new(key)))
    });
    let previous = REGISTERED_KEYS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(algorithm.to_string(), factory);
    if previous.is_some() || Family::of(algorithm).is_some() {
        tracing::warn!(algorithm, "overriding key factory");
    }
    Ok(())
}

/// Every algorithm identifier keys can currently be built for.
pub fn supported_algorithms() -> Vec<String> {
    let mut algorithms: Vec<String> = [
        HMAC_ALGORITHMS,
        RSA_ALGORITHMS,
        EC_ALGORITHMS,
        AES_ALGORITHMS,
        &[DIR],
    ]
    .concat()
    .into_iter()
    .map(str::to_string)
    .collect();
    algorithms.extend(
        REGISTERED_KEYS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned(),
    );
    algorithms.sort();
    algorithms.dedup();
    algorithms
}

/// Build a key from `key_data`.
///
/// When `algorithm` is `None`, the "alg" member of a JWK is used instead.
pub fn construct(key_data: &KeyData, algorithm: Option<&str>) -> Result<Key, Error> {
    let algorithm = match algorithm.or_else(|| key_data.algorithm()) {
        Some(algorithm) if !algorithm.is_empty() => algorithm,
        _ => bail!(JWTError::UnknownAlgorithm(
            "unable to determine the algorithm for the key".to_string()
        )),
    };
    let constructor = get_key(algorithm)
        .ok_or_else(|| JWTError::UnknownAlgorithm(algorithm.to_string()))?;
    constructor.construct(key_data, algorithm)
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};

    use super::*;

    #[derive(Debug)]
    struct NullKey;

    impl JoseKey for NullKey {
        fn algorithm(&self) -> &str {
            "X-NULL"
        }

        fn sign(&self, _signing_input: &[u8]) -> Result<Vec<u8>, Error> {
            Ok(b"null".to_vec())
        }

        fn verify(&self, _signing_input: &[u8], signature: &[u8]) -> bool {
            signature == b"null"
        }

        fn is_public(&self) -> bool {
            true
        }

        fn public_key(&self) -> Result<Key, Error> {
            Ok(Key::Custom(Arc::new(NullKey)))
        }

        fn to_dict(&self) -> Result<Map<String, Value>, Error> {
            Ok(Map::new())
        }
    }

    #[test]
    fn builtin_families() {
        assert!(matches!(
            get_key("HS256"),
            Some(KeyConstructor::Builtin(Family::Hmac))
        ));
        assert!(matches!(
            get_key("PS384"),
            Some(KeyConstructor::Builtin(Family::Rsa))
        ));
        assert!(matches!(
            get_key("dir"),
            Some(KeyConstructor::Builtin(Family::Dir))
        ));
        assert!(get_key("X-NOT-REGISTERED").is_none());
    }

    #[test]
    fn construct_from_jwk_algorithm() {
        let mut jwk = Map::new();
        jwk.insert("kty".to_string(), Value::from("oct"));
        jwk.insert("alg".to_string(), Value::from("HS512"));
        jwk.insert("k".to_string(), Value::from("c2VjcmV0"));
        let key = construct(&KeyData::Jwk(jwk), None).unwrap();
        assert_eq!(key.algorithm(), "HS512");
        assert_eq!(key.family(), Some(Family::Hmac));

        let err = construct(&"secret".into(), None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JWTError>(),
            Some(JWTError::UnknownAlgorithm(_))
        ));
        let err = construct(&"secret".into(), Some("HS1")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JWTError>(),
            Some(JWTError::UnknownAlgorithm(_))
        ));
        let err = construct(&"secret".into(), Some("ES256")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JWTError>(),
            Some(JWTError::KeyConstruction(_))
        ));
    }

    #[test]
    fn registered_factory() {
        register_key("X-NULL", |_key_data: &KeyData, _algorithm: &str| Ok(NullKey)).unwrap();
        assert!(matches!(
            get_key("X-NULL"),
            Some(KeyConstructor::Registered(_))
        ));
        assert!(supported_algorithms().contains(&"X-NULL".to_string()));
        assert!(supported_algorithms().contains(&"ES512".to_string()));

        let key = construct(&"anything".into(), Some("X-NULL")).unwrap();
        assert!(matches!(key, Key::Custom(_)));
        assert_eq!(key.family(), None);
        assert!(key.verify(b"input", b"null"));
        assert!(key.wrap_key(b"cek").is_err());

        assert!(register_key("", |_key_data: &KeyData, _algorithm: &str| Ok(NullKey)).is_err());
    }
}

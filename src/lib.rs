#![forbid(unsafe_code)]

pub mod algorithms;
pub mod claims;
pub mod common;
pub mod error;
pub mod jwk;
pub mod jws;
pub mod jwt;
pub mod key;

mod serde_additions;

pub use coarsetime;
pub use serde;
pub use serde_json;

pub mod prelude {
    pub use crate::algorithms::*;
    pub use crate::claims::*;
    pub use crate::common::*;
    pub use crate::error::{ClaimsError, Error, JWTError};
    pub use crate::jwk::{construct, get_key, register_key, supported_algorithms, KeyConstructor};
    pub use crate::jws::KeySource;
    pub use crate::key::*;
    pub use crate::{jws, jwt};
    pub use coarsetime::{self, Clock, Duration, UnixTimeStamp};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Map, Value};
}

#[cfg(test)]
mod tests {
    use crate::algorithms::rsa_tests::{RSA_KP_PEM, RSA_PK_PEM};
    use crate::prelude::*;

    #[test]
    fn hs384() {
        let key = HMACKey::from_bytes(b"your-256-bit-secret", "HS384")
            .unwrap()
            .with_key_id("my-key-id");
        let claims = Claims::create(Duration::from_secs(86400)).with_issuer("test issuer");
        let mut headers = Map::new();
        headers.insert("kid".to_string(), Value::from("my-key-id"));
        let token = jwt::encode(claims, &Key::Hmac(key.clone()).into(), "HS384", &headers, None).unwrap();
        let options = ValidationOptions::default().with_issuer("test issuer");
        let claims = jwt::decode(&token, &Key::Hmac(key).into(), Some(&["HS384"]), &options).unwrap();
        assert_eq!(claims["iss"], "test issuer");
        assert_eq!(jwt::get_unverified_header(&token).unwrap()["kid"], "my-key-id");
    }

    #[test]
    fn rs256() {
        let key_pair = construct(&RSA_KP_PEM.into(), Some("RS256")).unwrap();
        let claims = Claims::create(Duration::from_secs(86400));
        let token = jwt::encode(claims, &key_pair.into(), "RS256", &Map::new(), None).unwrap();
        let pk = KeySource::from(RSA_PK_PEM);
        let _claims = jwt::decode(&token, &pk, Some(&["RS256"]), &ValidationOptions::default()).unwrap();
        let err = jwt::decode(&token, &pk, Some(&["HS256"]), &ValidationOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JWTError>(),
            Some(JWTError::AlgorithmConfusion(_))
        ));
    }

    #[test]
    fn public_key_as_hmac_secret() {
        let forged = jwt::encode(
            Claims::new().with_subject("admin"),
            &RSA_PK_PEM.into(),
            "HS256",
            &Map::new(),
            None,
        );
        assert!(forged.is_err());
    }

    #[test]
    fn es512_jwk() {
        let key = ECKey::generate("ES512").unwrap().with_key_id("ec-1");
        let public_jwk = key.public_key().unwrap().to_dict().unwrap();
        let jwks = serde_json::json!({ "keys": [public_jwk] }).to_string();

        let mut headers = Map::new();
        headers.insert("kid".to_string(), Value::from("ec-1"));
        let token = jwt::encode(
            Claims::create(Duration::from_secs(60)),
            &Key::Ec(key).into(),
            "ES512",
            &headers,
            None,
        )
        .unwrap();
        let claims = jwt::decode(&token, &jwks.into(), Some(&["ES512"]), &ValidationOptions::default()).unwrap();
        assert!(claims.contains_key("exp"));
    }
}

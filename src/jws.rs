//! JWS compact serialization.
//!
//! Header members are serialized in lexicographic order, so two header maps
//! holding the same entries always produce the same header segment.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::algorithms::Family;
use crate::common::*;
use crate::error::*;
use crate::jwk;
use crate::key::*;

pub const MAX_HEADER_LENGTH: usize = 8192;

/// Where signing and verification keys come from.
#[derive(Clone, Debug)]
pub enum KeySource {
    /// An already constructed key. Its algorithm must match the token's.
    Key(Key),
    /// Key material, constructed for the token's algorithm on use.
    Data(KeyData),
    /// Key material indexed by key identifier, selected with the "kid" header.
    Set(BTreeMap<String, KeyData>),
}

impl KeySource {
    /// Interpret a JSON document as key material.
    ///
    /// `{"keys": [...]}` is a JWK set indexed by each key's "kid", an object
    /// with a "kty" member is a single JWK, and any other object maps key
    /// identifiers to keys, PEM strings or certificates.
    pub fn from_json(json: Value) -> Result<Self, Error> {
        let mut object = match json {
            Value::Object(object) => object,
            _ => bail!(JWTError::key("key material must be a JSON object")),
        };
        if object.contains_key("kty") {
            return Ok(KeySource::Data(KeyData::Jwk(object)));
        }
        let mut set = BTreeMap::new();
        if let Some(keys) = object.remove("keys") {
            let keys = match keys {
                Value::Array(keys) => keys,
                _ => bail!(JWTError::key("the keys member must be an array")),
            };
            for key in keys {
                let jwk = match key {
                    Value::Object(jwk) => jwk,
                    _ => bail!(JWTError::key("every member of a key set must be a JWK")),
                };
                if let Some(kid) = jwk.get("kid").and_then(Value::as_str) {
                    set.insert(kid.to_string(), KeyData::Jwk(jwk.clone()));
                }
            }
            return Ok(KeySource::Set(set));
        }
        for (kid, key) in object {
            let key_data = match key {
                Value::String(pem) => KeyData::from(pem),
                Value::Object(jwk) => KeyData::Jwk(jwk),
                _ => bail!(JWTError::key(format!("unsupported key for kid {}", kid))),
            };
            set.insert(kid, key_data);
        }
        Ok(KeySource::Set(set))
    }

    fn resolve(&self, algorithm: &str, kid: Option<&str>) -> Result<Key, Error> {
        match self {
            KeySource::Key(key) => {
                ensure!(
                    key.algorithm() == algorithm,
                    JWTError::AlgorithmConfusion(format!(
                        "the key is for {}, not {}",
                        key.algorithm(),
                        algorithm
                    ))
                );
                Ok(key.clone())
            }
            KeySource::Data(key_data) => jwk::construct(key_data, Some(algorithm)),
            KeySource::Set(set) => {
                let kid = kid.ok_or_else(|| {
                    JWTError::KeyNotFound("no kid header to select a key with".to_string())
                })?;
                let key_data = set
                    .get(kid)
                    .ok_or_else(|| JWTError::KeyNotFound(kid.to_string()))?;
                jwk::construct(key_data, Some(algorithm))
            }
        }
    }
}

impl From<Key> for KeySource {
    fn from(key: Key) -> Self {
        KeySource::Key(key)
    }
}

impl From<KeyData> for KeySource {
    fn from(key_data: KeyData) -> Self {
        KeySource::Data(key_data)
    }
}

impl From<BTreeMap<String, KeyData>> for KeySource {
    fn from(set: BTreeMap<String, KeyData>) -> Self {
        KeySource::Set(set)
    }
}

impl From<Map<String, Value>> for KeySource {
    fn from(object: Map<String, Value>) -> Self {
        match KeySource::from_json(Value::Object(object.clone())) {
            Ok(source) => source,
            Err(_) => KeySource::Data(KeyData::Jwk(object)),
        }
    }
}

impl From<&[u8]> for KeySource {
    fn from(raw: &[u8]) -> Self {
        KeySource::Data(KeyData::from(raw))
    }
}

/// A secret, an encoded key, or a JSON document holding keys.
///
/// Strings that parse as a JSON object go through [`KeySource::from_json`];
/// anything else, including numbers such as `"1234567890"`, is raw key
/// material.
impl From<&str> for KeySource {
    fn from(key: &str) -> Self {
        match serde_json::from_str::<Value>(key) {
            Ok(json @ Value::Object(_)) => KeySource::from_json(json)
                .unwrap_or_else(|_| KeySource::Data(KeyData::from(key))),
            _ => KeySource::Data(KeyData::from(key)),
        }
    }
}

impl From<String> for KeySource {
    fn from(key: String) -> Self {
        KeySource::from(key.as_str())
    }
}

fn ensure_signature_algorithm(algorithm: &str) -> Result<(), Error> {
    if let Some(family) = Family::of(algorithm) {
        ensure!(
            family.signs(),
            JWTError::AlgorithmConfusion(format!("{} is not a signature algorithm", algorithm))
        );
    }
    Ok(())
}

/// Sign `payload` and return the compact serialization.
///
/// The "alg" member of `headers` is always replaced with `algorithm`.
pub fn encode(
    payload: &[u8],
    key: &KeySource,
    algorithm: &str,
    headers: &Map<String, Value>,
) -> Result<String, Error> {
    ensure_signature_algorithm(algorithm)?;
    let alg = Value::from(algorithm);
    let mut header: BTreeMap<&str, &Value> =
        headers.iter().map(|(k, v)| (k.as_str(), v)).collect();
    header.insert("alg", &alg);
    let kid = headers.get("kid").and_then(Value::as_str);
    let key = key.resolve(algorithm, kid)?;

    let header_json = serde_json::to_string(&header)
        .map_err(|e| JWTError::malformed(format!("unable to serialize the header: {}", e)))?;
    let mut token = format!(
        "{}.{}",
        base64url_encode(header_json),
        base64url_encode(payload)
    );
    let signature = key.sign(token.as_bytes())?;
    token.push('.');
    token.push_str(&base64url_encode(signature));
    Ok(token)
}

struct CompactParts<'t> {
    header: Map<String, Value>,
    payload: Vec<u8>,
    signing_input: &'t str,
    signature: Vec<u8>,
}

fn split_token(token: &str) -> Result<CompactParts<'_>, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    let (header_b64, payload_b64, signature_b64) = match parts[..] {
        [header_b64, payload_b64, signature_b64] => (header_b64, payload_b64, signature_b64),
        _ => {
            tracing::debug!(segments = parts.len(), "rejecting token: not three segments");
            bail!(JWTError::malformed("wrong number of segments"))
        }
    };
    ensure!(
        header_b64.len() <= MAX_HEADER_LENGTH,
        JWTError::malformed("header too large")
    );
    let header_json = base64url_decode(header_b64)
        .map_err(|_| JWTError::malformed("invalid header padding"))?;
    let header = match serde_json::from_slice::<Value>(&header_json) {
        Ok(Value::Object(header)) => header,
        Ok(_) => bail!(JWTError::malformed("invalid header string: must be a json object")),
        Err(e) => bail!(JWTError::malformed(format!("invalid header string: {}", e))),
    };
    let payload = base64url_decode(payload_b64)
        .map_err(|_| JWTError::malformed("invalid payload padding"))?;
    let signature = base64url_decode(signature_b64)
        .map_err(|_| JWTError::malformed("invalid crypto padding"))?;
    Ok(CompactParts {
        header,
        payload,
        signing_input: &token[..header_b64.len() + 1 + payload_b64.len()],
        signature,
    })
}

/// Verify a compact token and return its payload.
///
/// The header's "alg" must belong to `algorithms`; an empty allow-list
/// rejects every token. With `verify` set to `false`, no algorithm, key or
/// signature check is made.
pub fn decode(
    token: &str,
    key: &KeySource,
    algorithms: &[&str],
    verify: bool,
) -> Result<Vec<u8>, Error> {
    let parts = split_token(token)?;
    let algorithm = match parts.header.get("alg") {
        Some(Value::String(algorithm)) => algorithm.as_str(),
        _ => bail!(JWTError::malformed("no valid alg header")),
    };
    if !verify {
        return Ok(parts.payload);
    }

    if !algorithms.contains(&algorithm) {
        tracing::debug!(algorithm, "rejecting token: algorithm not allowed");
        bail!(JWTError::AlgorithmConfusion(format!(
            "{} is not an allowed algorithm",
            algorithm
        )));
    }
    ensure_signature_algorithm(algorithm)?;
    let kid = parts.header.get("kid").and_then(Value::as_str);
    let key = key.resolve(algorithm, kid).map_err(|e| {
        tracing::debug!(algorithm, "rejecting token: no usable key");
        e
    })?;
    if !key.verify(parts.signing_input.as_bytes(), &parts.signature) {
        tracing::debug!(algorithm, "rejecting token: bad signature");
        bail!(JWTError::SignatureVerification);
    }
    Ok(parts.payload)
}

/// The token header, without any verification.
pub fn get_unverified_header(token: &str) -> Result<Map<String, Value>, Error> {
    Ok(split_token(token)?.header)
}

/// The raw token payload, without any verification.
pub fn get_unverified_claims(token: &str) -> Result<Vec<u8>, Error> {
    Ok(split_token(token)?.payload)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::algorithms::*;

    fn headers(value: Value) -> Map<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    fn error_of(err: &Error) -> &JWTError {
        err.downcast_ref::<JWTError>().unwrap()
    }

    #[test]
    fn encode_and_decode() {
        let key = KeySource::from("secret");
        let token = encode(b"{\"a\":\"b\"}", &key, "HS256", &Map::new()).unwrap();
        assert_eq!(
            token,
            "eyJhbGciOiJIUzI1NiJ9.eyJhIjoiYiJ9.DRwcShm-M7fOQcRhdmtqzzuiNPsv2tAnkV2gfnDMmM0"
        );
        let payload = decode(&token, &key, &["HS256"], true).unwrap();
        assert_eq!(payload, b"{\"a\":\"b\"}");
    }

    #[test]
    fn empty_allow_list() {
        let key = KeySource::from("secret");
        let token = encode(b"{}", &key, "HS256", &Map::new()).unwrap();
        let err = decode(&token, &key, &[], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::AlgorithmConfusion(_)));
        let err = decode(&token, &key, &["HS384"], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::AlgorithmConfusion(_)));
        assert_eq!(decode(&token, &key, &[], false).unwrap(), b"{}");
    }

    #[test]
    fn key_algorithm_must_match() {
        let hs384 = Key::Hmac(HMACKey::from_bytes(b"secret", "HS384").unwrap());
        let hs256 = Key::Hmac(HMACKey::from_bytes(b"secret", "HS256").unwrap());
        let token = encode(b"{}", &hs256.clone().into(), "HS256", &Map::new()).unwrap();
        let err = decode(&token, &hs384.into(), &["HS256"], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::AlgorithmConfusion(_)));
        assert!(decode(&token, &hs256.into(), &["HS256"], true).is_ok());
    }

    #[test]
    fn bad_signature() {
        let token = encode(b"{}", &"secret".into(), "HS256", &Map::new()).unwrap();
        let err = decode(&token, &"other".into(), &["HS256"], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::SignatureVerification));

        let (signing_input, _) = token.rsplit_once('.').unwrap();
        let stripped = format!("{}.", signing_input);
        let err = decode(&stripped, &"secret".into(), &["HS256"], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::SignatureVerification));
    }

    #[test]
    fn key_management_algorithms_do_not_sign() {
        let aes = KeySource::Data(KeyData::Raw(vec![0u8; 16]));
        let err = encode(b"{}", &aes, "A128KW", &Map::new()).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::AlgorithmConfusion(_)));

        let forged = format!(
            "{}.{}.",
            base64url_encode(r#"{"alg":"dir"}"#),
            base64url_encode("{}")
        );
        let err = decode(&forged, &"secret".into(), &["dir"], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::AlgorithmConfusion(_)));
    }

    #[test]
    fn malformed_tokens() {
        let key = KeySource::from("secret");
        for token in [
            "",
            "a.b",
            "a.b.c.d",
            "!!!.e30.",
            "eyJhbGciOiJIUzI1NiJ9.!!!.",
            "bm90IGpzb24.e30.",
            "WyJIUzI1NiJd.e30.",
            "e30.e30.",
        ] {
            let err = decode(token, &key, &["HS256"], true).unwrap_err();
            assert!(
                matches!(error_of(&err), JWTError::MalformedToken(_)),
                "{}",
                token
            );
        }
        for token in ["a.b", "a.b.c.d"] {
            let err = get_unverified_header(token).unwrap_err();
            assert_eq!(
                error_of(&err).to_string(),
                JWTError::malformed("wrong number of segments").to_string()
            );
        }
        let huge = format!("{}.e30.", "a".repeat(MAX_HEADER_LENGTH + 4));
        assert!(matches!(
            error_of(&decode(&huge, &key, &["HS256"], true).unwrap_err()),
            JWTError::MalformedToken(_)
        ));
    }

    #[test]
    fn padding_tolerated() {
        let key = KeySource::from("secret");
        let token = encode(b"{\"a\":1}", &key, "HS256", &Map::new()).unwrap();
        let padded: Vec<String> = token
            .split('.')
            .map(|segment| {
                let mut segment = segment.to_string();
                while segment.len() % 4 != 0 {
                    segment.push('=');
                }
                segment
            })
            .collect();
        let padded = padded.join(".");
        assert_eq!(get_unverified_claims(&padded).unwrap(), b"{\"a\":1}");
        assert_eq!(get_unverified_header(&padded).unwrap()["alg"], "HS256");
        // the signature covers the segments exactly as transmitted
        let err = decode(&padded, &key, &["HS256"], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::SignatureVerification));
    }

    #[test]
    fn canonical_header_order() {
        let key = KeySource::from("secret");
        let a = headers(json!({"kid": "my-key-id", "another_key": "another_value"}));
        let mut b = Map::new();
        b.insert("another_key".to_string(), Value::from("another_value"));
        b.insert("kid".to_string(), Value::from("my-key-id"));
        b.insert("alg".to_string(), Value::from("RS256"));
        let token_a = encode(b"{}", &key, "HS256", &a).unwrap();
        let token_b = encode(b"{}", &key, "HS256", &b).unwrap();
        assert_eq!(token_a, token_b);
        let header = get_unverified_header(&token_a).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(
            base64url_decode(token_a.split('.').next().unwrap()).unwrap(),
            br#"{"alg":"HS256","another_key":"another_value","kid":"my-key-id"}"#
        );
    }

    #[test]
    fn key_set_selection() {
        let set = KeySource::from(r#"{"first": "secret-1", "second": "secret-2"}"#);
        let second = headers(json!({"kid": "second"}));
        let token = encode(b"{}", &set, "HS256", &second).unwrap();
        assert!(decode(&token, &set, &["HS256"], true).is_ok());
        assert!(decode(&token, &"secret-2".into(), &["HS256"], true).is_ok());
        assert!(decode(&token, &"secret-1".into(), &["HS256"], true).is_err());

        let unknown = headers(json!({"kid": "third"}));
        let token = encode(b"{}", &"secret-3".into(), "HS256", &unknown).unwrap();
        let err = decode(&token, &set, &["HS256"], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::KeyNotFound(_)));

        let token = encode(b"{}", &"secret-1".into(), "HS256", &Map::new()).unwrap();
        let err = decode(&token, &set, &["HS256"], true).unwrap_err();
        assert!(matches!(error_of(&err), JWTError::KeyNotFound(_)));
    }

    #[test]
    fn jwk_set() {
        let jwks = r#"{"keys": [
            {"kty": "oct", "kid": "a", "k": "c2VjcmV0LWE"},
            {"kty": "oct", "kid": "b", "k": "c2VjcmV0LWI"}
        ]}"#;
        let set = KeySource::from(jwks);
        assert!(matches!(&set, KeySource::Set(keys) if keys.len() == 2));
        let token = encode(b"{}", &"secret-b".into(), "HS256", &headers(json!({"kid": "b"}))).unwrap();
        assert!(decode(&token, &set, &["HS256"], true).is_ok());

        let single = KeySource::from(r#"{"kty": "oct", "k": "c2VjcmV0LWI"}"#);
        assert!(matches!(single, KeySource::Data(KeyData::Jwk(_))));
        assert!(decode(&token, &single, &["HS256"], true).is_ok());
    }

    #[test]
    fn numeric_strings_are_secrets() {
        assert!(matches!(
            KeySource::from("1234567890"),
            KeySource::Data(KeyData::Raw(_))
        ));
        assert!(matches!(
            KeySource::from("123456789.0"),
            KeySource::Data(KeyData::Raw(_))
        ));
    }

    #[test]
    fn ecdsa_round_trip() {
        let key = Key::Ec(ECKey::generate("ES384").unwrap());
        let public_key = key.public_key().unwrap();
        let token = encode(b"payload", &key.into(), "ES384", &Map::new()).unwrap();
        let payload = decode(&token, &public_key.into(), &["ES384", "ES256"], true).unwrap();
        assert_eq!(payload, b"payload");
    }
}

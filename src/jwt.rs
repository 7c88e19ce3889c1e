//! JSON Web Tokens: JWS tokens whose payload is a JSON object of claims.

use serde_json::{Map, Value};

use crate::claims::*;
use crate::common::*;
use crate::error::*;
use crate::jws::{self, KeySource};

fn parse_claims(payload: &[u8]) -> Result<ClaimsSet, Error> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => bail!(JWTError::Claims(ClaimsError::NotAnObject)),
        Err(e) => bail!(JWTError::Claims(ClaimsError::InvalidPayload(e.to_string()))),
    }
}

/// Sign a set of claims.
///
/// Fractional "exp", "nbf" and "iat" values are truncated to whole seconds,
/// "typ" defaults to "JWT", and when `access_token` is given the matching
/// "at_hash" claim is added.
pub fn encode(
    claims: impl Into<ClaimsSet>,
    key: &KeySource,
    algorithm: &str,
    headers: &Map<String, Value>,
    access_token: Option<&str>,
) -> Result<String, Error> {
    let mut claims = claims.into();
    normalize_temporal_claims(&mut claims);
    if let Some(access_token) = access_token {
        claims.insert(
            "at_hash".to_string(),
            Value::from(calculate_at_hash(access_token, algorithm)?),
        );
    }
    let mut headers = headers.clone();
    headers
        .entry("typ")
        .or_insert_with(|| Value::from("JWT"));
    let payload = serde_json::to_vec(&claims)
        .map_err(|e| JWTError::Claims(ClaimsError::InvalidPayload(e.to_string())))?;
    jws::encode(&payload, key, algorithm, &headers)
}

/// Verify a token and validate its claims.
///
/// With `algorithms` set to `None`, the token's own algorithm is the only
/// one allowed; the key still has to be valid for it. An empty allow-list
/// rejects every token.
pub fn decode(
    token: &str,
    key: &KeySource,
    algorithms: Option<&[&str]>,
    options: &ValidationOptions,
) -> Result<ClaimsSet, Error> {
    let header = jws::get_unverified_header(token)?;
    let algorithm = header.get("alg").and_then(Value::as_str).unwrap_or_default();
    let own_algorithm = [algorithm];
    let algorithms = algorithms.unwrap_or(&own_algorithm);
    let payload = jws::decode(token, key, algorithms, options.verify_signature)?;
    let claims = parse_claims(&payload)?;
    validate(&claims, algorithm, options)?;
    Ok(claims)
}

/// The token header, without any verification.
pub fn get_unverified_header(token: &str) -> Result<Map<String, Value>, Error> {
    jws::get_unverified_header(token)
}

/// The token claims, without any verification.
///
/// The payload still has to be a JSON object.
pub fn get_unverified_claims(token: &str) -> Result<ClaimsSet, Error> {
    parse_claims(&jws::get_unverified_claims(token)?)
}

use std::time::{SystemTime, UNIX_EPOCH};

use coarsetime::{Clock, Duration, UnixTimeStamp};
use serde_json::{Map, Value};

use crate::algorithms::HashAlg;
use crate::common::*;
use crate::error::*;

/// A decoded set of claims, registered and application-defined alike.
pub type ClaimsSet = Map<String, Value>;

/// Registered claims holding a time, as seconds since the Unix epoch.
pub const TEMPORAL_CLAIMS: &[&str] = &["exp", "nbf", "iat"];

/// Claims that can be made mandatory with a `require_*` option.
pub const REQUIRABLE_CLAIMS: &[&str] = &["aud", "iat", "exp", "nbf", "iss", "sub", "jti", "at_hash"];

/// A point in time in the integer form used by "exp", "nbf" and "iat".
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NumericDate(pub i64);

impl From<i64> for NumericDate {
    fn from(secs: i64) -> Self {
        NumericDate(secs)
    }
}

impl From<UnixTimeStamp> for NumericDate {
    fn from(ts: UnixTimeStamp) -> Self {
        NumericDate(ts.as_secs() as i64)
    }
}

impl From<SystemTime> for NumericDate {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => NumericDate(since.as_secs() as i64),
            Err(before) => NumericDate(-(before.duration().as_secs() as i64)),
        }
    }
}

impl From<NumericDate> for Value {
    fn from(date: NumericDate) -> Self {
        Value::from(date.0)
    }
}

/// A builder for claim sets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Claims {
    claims: ClaimsSet,
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims issued now, valid for `valid_for`.
    pub fn create(valid_for: Duration) -> Self {
        let now = Clock::now_since_epoch();
        Claims::new()
            .issued_at(now)
            .invalid_before(now)
            .expires_at(now + valid_for)
    }

    pub fn issued_at(self, date: impl Into<NumericDate>) -> Self {
        self.with_claim("iat", date.into())
    }

    /// Set the token as not being valid until `date`
    pub fn invalid_before(self, date: impl Into<NumericDate>) -> Self {
        self.with_claim("nbf", date.into())
    }

    pub fn expires_at(self, date: impl Into<NumericDate>) -> Self {
        self.with_claim("exp", date.into())
    }

    /// Set the issuer
    pub fn with_issuer(self, issuer: impl ToString) -> Self {
        self.with_claim("iss", issuer.to_string())
    }

    /// Set the subject
    pub fn with_subject(self, subject: impl ToString) -> Self {
        self.with_claim("sub", subject.to_string())
    }

    /// Set a single audience
    pub fn with_audience(self, audience: impl ToString) -> Self {
        self.with_claim("aud", audience.to_string())
    }

    /// Set multiple audiences
    pub fn with_audiences<I, S>(self, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let audiences: Vec<Value> = audiences
            .into_iter()
            .map(|x| Value::from(x.to_string()))
            .collect();
        self.with_claim("aud", audiences)
    }

    /// Set the token identifier
    pub fn with_jwt_id(self, jwt_id: impl ToString) -> Self {
        self.with_claim("jti", jwt_id.to_string())
    }

    /// Set any claim
    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    pub fn into_map(self) -> ClaimsSet {
        self.claims
    }
}

impl From<Claims> for ClaimsSet {
    fn from(claims: Claims) -> Self {
        claims.claims
    }
}

/// Store fractional temporal claims as whole seconds.
pub(crate) fn normalize_temporal_claims(claims: &mut ClaimsSet) {
    for name in TEMPORAL_CLAIMS {
        if let Some(value) = claims.get_mut(*name) {
            if let Some(secs) = value.as_f64().filter(|_| !value.is_i64() && !value.is_u64()) {
                if secs.is_finite() {
                    *value = Value::from(secs.trunc() as i64);
                }
            }
        }
    }
}

/// The "at_hash" value binding a token to `access_token`.
///
/// This is the base64url encoding of the left half of the access token
/// digest, the digest being the one used by `algorithm`.
pub fn calculate_at_hash(access_token: &str, algorithm: &str) -> Result<String, Error> {
    at_hash(access_token, algorithm).map_err(|e| JWTError::Claims(e).into())
}

fn at_hash(access_token: &str, algorithm: &str) -> Result<String, ClaimsError> {
    let hash = HashAlg::for_algorithm(algorithm).ok_or(ClaimsError::AtHashUnavailable)?;
    let digest = hash.digest(access_token.as_bytes());
    Ok(base64url_encode(&digest[..digest.len() / 2]))
}

fn check(condition: bool, error: ClaimsError) -> Result<(), ClaimsError> {
    if condition {
        Ok(())
    } else {
        Err(error)
    }
}

fn numeric_claim(claims: &ClaimsSet, name: &str) -> Result<Option<i64>, ClaimsError> {
    let value = match claims.get(name) {
        None => return Ok(None),
        Some(value) => value,
    };
    if let Some(secs) = value.as_i64() {
        return Ok(Some(secs));
    }
    match value.as_f64() {
        Some(secs) if secs.is_finite() => Ok(Some(secs.trunc() as i64)),
        _ => Err(ClaimsError::invalid(name, "must be an integer")),
    }
}

fn string_claim<'c>(claims: &'c ClaimsSet, name: &str) -> Result<Option<&'c str>, ClaimsError> {
    match claims.get(name) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(ClaimsError::invalid(name, "must be a string")),
    }
}

fn validate_audience(claims: &ClaimsSet, audience: Option<&str>) -> Result<(), ClaimsError> {
    let invalid = || ClaimsError::invalid("aud", "must be a string or a list of strings");
    let audiences: Vec<&str> = match claims.get("aud") {
        None => return check(audience.is_none(), ClaimsError::InvalidAudience),
        Some(Value::String(aud)) => vec![aud.as_str()],
        Some(Value::Array(auds)) => auds
            .iter()
            .map(|aud| aud.as_str().ok_or_else(invalid))
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(invalid()),
    };
    match audience {
        Some(audience) => check(audiences.contains(&audience), ClaimsError::InvalidAudience),
        None => Err(ClaimsError::InvalidAudience),
    }
}

fn validate_at_hash(
    claims: &ClaimsSet,
    algorithm: &str,
    access_token: Option<&str>,
) -> Result<(), ClaimsError> {
    match (access_token, string_claim(claims, "at_hash")?) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(ClaimsError::MissingAccessToken),
        (Some(_), None) => Err(ClaimsError::MissingAtHash),
        (Some(access_token), Some(claim)) => {
            let expected = at_hash(access_token, algorithm)?;
            check(
                ct_codecs::verify(expected.as_bytes(), claim.as_bytes()),
                ClaimsError::AtHashMismatch,
            )
        }
    }
}

fn validate_claims(
    claims: &ClaimsSet,
    algorithm: &str,
    options: &ValidationOptions,
) -> Result<(), ClaimsError> {
    for name in REQUIRABLE_CLAIMS {
        if options.is_required(name) {
            check(
                claims.contains_key(*name),
                ClaimsError::MissingClaim(name.to_string()),
            )?;
        }
    }

    let now = i64::try_from(options.now().as_secs()).unwrap_or(i64::MAX);
    let leeway = i64::try_from(options.leeway.as_secs()).unwrap_or(i64::MAX);
    if options.verify_iat {
        numeric_claim(claims, "iat")?;
    }
    if options.verify_nbf {
        if let Some(nbf) = numeric_claim(claims, "nbf")? {
            check(now >= nbf.saturating_sub(leeway), ClaimsError::NotYetValid)?;
        }
    }
    if options.verify_exp {
        if let Some(exp) = numeric_claim(claims, "exp")? {
            check(now < exp.saturating_add(leeway), ClaimsError::Expired)?;
        }
    }
    if options.verify_aud {
        validate_audience(claims, options.audience.as_deref())?;
    }
    if options.verify_iss {
        let issuer = string_claim(claims, "iss")?;
        if let Some(issuers) = &options.issuer {
            check(
                issuer.map_or(false, |issuer| issuers.iter().any(|x| x == issuer)),
                ClaimsError::InvalidIssuer,
            )?;
        }
    }
    if options.verify_sub {
        let subject = string_claim(claims, "sub")?;
        if let Some(expected) = &options.subject {
            check(subject == Some(expected.as_str()), ClaimsError::InvalidSubject)?;
        }
    }
    if options.verify_jti {
        string_claim(claims, "jti")?;
    }
    if options.verify_at_hash {
        validate_at_hash(claims, algorithm, options.access_token.as_deref())?;
    }
    Ok(())
}

/// Check the registered claims of a decoded token.
///
/// Checks run in a fixed order and the first violation is reported.
/// `algorithm` is the token's algorithm, used to recompute "at_hash".
pub fn validate(claims: &ClaimsSet, algorithm: &str, options: &ValidationOptions) -> Result<(), Error> {
    validate_claims(claims, algorithm, options).map_err(|e| {
        tracing::debug!(reason = %e, "rejecting claims");
        JWTError::Claims(e).into()
    })
}

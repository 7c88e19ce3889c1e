use coarsetime::{Duration, UnixTimeStamp};
use ct_codecs::{Base64UrlSafeNoPadding, Decoder, Encoder};
use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::serde_additions;

/// Options controlling how the claims of a token are validated.
///
/// Every check is enabled by default, nothing is required by default, and
/// no clock skew is tolerated unless `leeway` is set.
///
/// The structure can also be loaded from a JSON mapping such as
/// `{"verify_exp": false, "leeway": 10, "audience": "api"}`; missing
/// fields keep their default value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Check the signature of the token
    pub verify_signature: bool,

    /// Check that the "exp" claim, if present, is not in the past
    pub verify_exp: bool,

    /// Check that the "nbf" claim, if present, is not in the future
    pub verify_nbf: bool,

    /// Check that the "iat" claim, if present, is a number
    pub verify_iat: bool,

    /// Check the "aud" claim against `audience`
    pub verify_aud: bool,

    /// Check the "iss" claim against `issuer`
    pub verify_iss: bool,

    /// Check the "sub" claim against `subject`
    pub verify_sub: bool,

    /// Check that the "jti" claim, if present, is a string
    pub verify_jti: bool,

    /// Check the "at_hash" claim against `access_token`
    pub verify_at_hash: bool,

    pub require_aud: bool,
    pub require_iat: bool,
    pub require_exp: bool,
    pub require_nbf: bool,
    pub require_iss: bool,
    pub require_sub: bool,
    pub require_jti: bool,
    pub require_at_hash: bool,

    /// Time tolerance for validating "exp" and "nbf"
    #[serde(with = "serde_additions::duration_secs")]
    pub leeway: Duration,

    /// Expected audience
    pub audience: Option<String>,

    /// Acceptable issuers. A single string is accepted when deserializing.
    #[serde(deserialize_with = "serde_additions::one_or_many::deserialize")]
    pub issuer: Option<Vec<String>>,

    /// Expected subject
    pub subject: Option<String>,

    /// Access token the "at_hash" claim must be bound to
    pub access_token: Option<String>,

    /// Validate temporal claims as if the current time was this one
    #[serde(skip)]
    pub artificial_time: Option<UnixTimeStamp>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            verify_signature: true,
            verify_exp: true,
            verify_nbf: true,
            verify_iat: true,
            verify_aud: true,
            verify_iss: true,
            verify_sub: true,
            verify_jti: true,
            verify_at_hash: true,
            require_aud: false,
            require_iat: false,
            require_exp: false,
            require_nbf: false,
            require_iss: false,
            require_sub: false,
            require_jti: false,
            require_at_hash: false,
            leeway: Duration::from_secs(0),
            audience: None,
            issuer: None,
            subject: None,
            access_token: None,
            artificial_time: None,
        }
    }
}

impl ValidationOptions {
    /// Set the expected audience
    pub fn with_audience(mut self, audience: impl ToString) -> Self {
        self.audience = Some(audience.to_string());
        self
    }

    /// Accept a single issuer
    pub fn with_issuer(mut self, issuer: impl ToString) -> Self {
        self.issuer = Some(vec![issuer.to_string()]);
        self
    }

    /// Accept any issuer from an ordered collection
    pub fn with_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.issuer = Some(issuers.into_iter().map(|x| x.to_string()).collect());
        self
    }

    /// Set the expected subject
    pub fn with_subject(mut self, subject: impl ToString) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Set the access token to check "at_hash" against
    pub fn with_access_token(mut self, access_token: impl ToString) -> Self {
        self.access_token = Some(access_token.to_string());
        self
    }

    /// Set the tolerance for temporal claims
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Load options from a JSON mapping
    pub fn from_json(options: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(options.clone())
    }

    pub(crate) fn now(&self) -> UnixTimeStamp {
        self.artificial_time
            .unwrap_or_else(coarsetime::Clock::now_since_epoch)
    }

    pub(crate) fn is_required(&self, claim: &str) -> bool {
        match claim {
            "aud" => self.require_aud,
            "iat" => self.require_iat,
            "exp" => self.require_exp,
            "nbf" => self.require_nbf,
            "iss" => self.require_iss,
            "sub" => self.require_sub,
            "jti" => self.require_jti,
            "at_hash" => self.require_at_hash,
            _ => false,
        }
    }
}

/// Base64url encoding without padding.
pub fn base64url_encode(bin: impl AsRef<[u8]>) -> String {
    Base64UrlSafeNoPadding::encode_to_string(bin).unwrap_or_default()
}

/// Base64url decoding. Trailing padding is tolerated.
pub fn base64url_decode(encoded: &str) -> Result<Vec<u8>, Error> {
    let encoded = encoded.trim_end_matches('=');
    Base64UrlSafeNoPadding::decode_to_vec(encoded, None)
        .map_err(|_| JWTError::malformed("invalid base64url encoding").into())
}

#[test]
fn options_from_json() {
    let options = ValidationOptions::from_json(&serde_json::json!({
        "verify_exp": false,
        "require_sub": true,
        "leeway": 10,
        "issuer": "https://issuer",
    }))
    .unwrap();
    assert!(!options.verify_exp);
    assert!(options.verify_nbf);
    assert!(options.require_sub);
    assert!(options.is_required("sub"));
    assert!(!options.is_required("aud"));
    assert_eq!(options.leeway.as_secs(), 10);
    assert_eq!(options.issuer, Some(vec!["https://issuer".to_string()]));

    let options =
        ValidationOptions::from_json(&serde_json::json!({ "issuer": ["a", "b"] })).unwrap();
    assert_eq!(options.issuer.unwrap().len(), 2);
    assert!(ValidationOptions::from_json(&serde_json::json!({ "leeway": -1 })).is_err());
}

//! ECDSA keys over the NIST curves.
//!
//! The primitives produce and consume DER-encoded signatures (a SEQUENCE of two
//! INTEGERs). JWS uses the fixed-width `r || s` layout instead, each component
//! left-padded with zeros to the byte length of the curve order.

use serde_json::{Map, Value};

use super::{Family, ES256, ES384, ES512};
use crate::common::*;
use crate::error::*;
use crate::key::*;

macro_rules! curve_primitives {
    ($module:ident, $krate:ident) => {
        mod $module {
            use ::$krate::ecdsa::signature::{Signer as _, Verifier as _};
            use ::$krate::ecdsa::{Signature, SigningKey, VerifyingKey};
            use ::$krate::elliptic_curve::sec1::ToEncodedPoint as _;
            use ::$krate::pkcs8::{DecodePrivateKey as _, DecodePublicKey as _};

            pub use ::$krate::{PublicKey, SecretKey};

            pub fn from_pem(pem: &str) -> Option<(PublicKey, Option<SecretKey>)> {
                if let Ok(sk) = SecretKey::from_sec1_pem(pem) {
                    return Some((sk.public_key(), Some(sk)));
                }
                if let Ok(sk) = SecretKey::from_pkcs8_pem(pem) {
                    return Some((sk.public_key(), Some(sk)));
                }
                PublicKey::from_public_key_pem(pem)
                    .ok()
                    .map(|pk| (pk, None))
            }

            pub fn from_der(der: &[u8]) -> Option<(PublicKey, Option<SecretKey>)> {
                if let Ok(sk) = SecretKey::from_sec1_der(der) {
                    return Some((sk.public_key(), Some(sk)));
                }
                if let Ok(sk) = SecretKey::from_pkcs8_der(der) {
                    return Some((sk.public_key(), Some(sk)));
                }
                PublicKey::from_public_key_der(der)
                    .ok()
                    .map(|pk| (pk, None))
            }

            pub fn public_from_sec1(sec1: &[u8]) -> Option<PublicKey> {
                PublicKey::from_sec1_bytes(sec1).ok()
            }

            pub fn secret_from_slice(d: &[u8]) -> Option<SecretKey> {
                SecretKey::from_slice(d).ok()
            }

            pub fn sec1_uncompressed(pk: &PublicKey) -> Vec<u8> {
                pk.to_encoded_point(false).as_bytes().to_vec()
            }

            pub fn secret_bytes(sk: &SecretKey) -> Vec<u8> {
                sk.to_bytes().to_vec()
            }

            pub fn generate() -> SecretKey {
                SecretKey::random(&mut rand::thread_rng())
            }

            pub fn sign_der(sk: &SecretKey, message: &[u8]) -> Option<Vec<u8>> {
                let signing_key = SigningKey::from_slice(&sk.to_bytes()).ok()?;
                let signature: Signature = signing_key.try_sign(message).ok()?;
                Some(signature.to_der().as_bytes().to_vec())
            }

            pub fn verify_der(pk: &PublicKey, message: &[u8], der: &[u8]) -> bool {
                let signature = match Signature::from_der(der) {
                    Ok(signature) => signature,
                    Err(_) => return false,
                };
                let verifying_key = match VerifyingKey::from_sec1_bytes(&sec1_uncompressed(pk)) {
                    Ok(verifying_key) => verifying_key,
                    Err(_) => return false,
                };
                verifying_key.verify(message, &signature).is_ok()
            }
        }
    };
}

curve_primitives!(nist_p256, p256);
curve_primitives!(nist_p384, p384);
curve_primitives!(nist_p521, p521);

/// A NIST curve usable for JWS signatures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    pub fn for_algorithm(algorithm: &str) -> Option<Curve> {
        match algorithm {
            ES256 => Some(Curve::P256),
            ES384 => Some(Curve::P384),
            ES512 => Some(Curve::P521),
            _ => None,
        }
    }

    /// The JWK "crv" name.
    pub fn name(self) -> &'static str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
            Curve::P521 => "P-521",
        }
    }

    /// Byte length of each signature component, `ceil(order_bits / 8)`.
    pub fn component_len(self) -> usize {
        match self {
            Curve::P256 => 32,
            Curve::P384 => 48,
            Curve::P521 => 66,
        }
    }

    fn algorithm(self) -> &'static str {
        match self {
            Curve::P256 => ES256,
            Curve::P384 => ES384,
            Curve::P521 => ES512,
        }
    }
}

const DER_SEQUENCE: u8 = 0x30;
const DER_INTEGER: u8 = 0x02;

fn invalid_der() -> Error {
    JWTError::malformed("invalid DER signature").into()
}

fn read_der_length(der: &[u8], pos: &mut usize) -> Result<usize, Error> {
    let first = *der.get(*pos).ok_or_else(invalid_der)?;
    *pos += 1;
    match first {
        len if len < 0x80 => Ok(len as usize),
        0x81 => {
            let len = *der.get(*pos).ok_or_else(invalid_der)?;
            *pos += 1;
            ensure!(len >= 0x80, invalid_der());
            Ok(len as usize)
        }
        _ => Err(invalid_der()),
    }
}

fn read_der_integer<'t>(der: &'t [u8], pos: &mut usize) -> Result<&'t [u8], Error> {
    ensure!(der.get(*pos) == Some(&DER_INTEGER), invalid_der());
    *pos += 1;
    let len = read_der_length(der, pos)?;
    let value = der.get(*pos..*pos + len).ok_or_else(invalid_der)?;
    *pos += len;
    ensure!(!value.is_empty() && value[0] & 0x80 == 0, invalid_der());
    let first_nonzero = value.iter().position(|&x| x != 0).unwrap_or(value.len());
    Ok(&value[first_nonzero..])
}

fn write_der_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        out.push(0x81);
        out.push(len as u8);
    }
}

fn write_der_integer(out: &mut Vec<u8>, component: &[u8]) {
    let first_nonzero = component
        .iter()
        .position(|&x| x != 0)
        .unwrap_or(component.len() - 1);
    let magnitude = &component[first_nonzero..];
    let sign_guard = magnitude[0] & 0x80 != 0;
    out.push(DER_INTEGER);
    write_der_length(out, magnitude.len() + sign_guard as usize);
    if sign_guard {
        out.push(0x00);
    }
    out.extend_from_slice(magnitude);
}

/// Convert a DER ECDSA signature into the fixed-width `r || s` form.
///
/// Sign-guard and other leading zero bytes are stripped before each component
/// is left-padded to `curve.component_len()` bytes.
pub fn der_to_raw(der: &[u8], curve: Curve) -> Result<Vec<u8>, Error> {
    let width = curve.component_len();
    let mut pos = 0;
    ensure!(der.first() == Some(&DER_SEQUENCE), invalid_der());
    pos += 1;
    let len = read_der_length(der, &mut pos)?;
    ensure!(der.len() == pos + len, invalid_der());
    let r = read_der_integer(der, &mut pos)?;
    let s = read_der_integer(der, &mut pos)?;
    ensure!(pos == der.len(), invalid_der());
    ensure!(r.len() <= width && s.len() <= width, invalid_der());

    let mut raw = vec![0u8; width * 2];
    raw[width - r.len()..width].copy_from_slice(r);
    raw[width * 2 - s.len()..].copy_from_slice(s);
    Ok(raw)
}

/// Convert a fixed-width `r || s` signature into DER.
///
/// Each half is encoded as a minimal INTEGER, with a single zero byte in front
/// only when its high bit is set.
pub fn raw_to_der(raw: &[u8], curve: Curve) -> Result<Vec<u8>, Error> {
    let width = curve.component_len();
    ensure!(
        raw.len() == width * 2,
        JWTError::malformed("invalid signature length")
    );
    let mut content = Vec::with_capacity(raw.len() + 6);
    write_der_integer(&mut content, &raw[..width]);
    write_der_integer(&mut content, &raw[width..]);

    let mut der = Vec::with_capacity(content.len() + 3);
    der.push(DER_SEQUENCE);
    write_der_length(&mut der, content.len());
    der.extend_from_slice(&content);
    Ok(der)
}

#[derive(Clone)]
enum ECKeyPair {
    P256(nist_p256::PublicKey, Option<nist_p256::SecretKey>),
    P384(nist_p384::PublicKey, Option<nist_p384::SecretKey>),
    P521(nist_p521::PublicKey, Option<nist_p521::SecretKey>),
}

#[derive(Clone)]
pub struct ECKey {
    curve: Curve,
    key_pair: ECKeyPair,
    key_id: Option<String>,
}

impl std::fmt::Debug for ECKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ECKey")
            .field("curve", &self.curve)
            .field("public", &self.is_public())
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl ECKey {
    pub fn new(key_data: &KeyData, algorithm: &str) -> Result<Self, Error> {
        check_family(Family::Ec, algorithm)?;
        let curve = Curve::for_algorithm(algorithm)
            .ok_or_else(|| JWTError::key(format!("no curve for {}", algorithm)))?;
        let key_pair = match key_data {
            KeyData::Jwk(jwk) => Self::pair_from_jwk(jwk, curve, algorithm)?,
            KeyData::Raw(raw) => match key_data.as_text() {
                Some(pem) if pem.starts_with("-----BEGIN") => Self::pair_from_pem(pem, curve)?,
                _ => Self::pair_from_der(raw, curve)?,
            },
        };
        Ok(ECKey {
            curve,
            key_pair,
            key_id: key_data.key_id().map(str::to_string),
        })
    }

    /// Generate a random key pair for `algorithm`.
    pub fn generate(algorithm: &str) -> Result<Self, Error> {
        check_family(Family::Ec, algorithm)?;
        let curve = Curve::for_algorithm(algorithm)
            .ok_or_else(|| JWTError::key(format!("no curve for {}", algorithm)))?;
        let key_pair = match curve {
            Curve::P256 => {
                let sk = nist_p256::generate();
                ECKeyPair::P256(sk.public_key(), Some(sk))
            }
            Curve::P384 => {
                let sk = nist_p384::generate();
                ECKeyPair::P384(sk.public_key(), Some(sk))
            }
            Curve::P521 => {
                let sk = nist_p521::generate();
                ECKeyPair::P521(sk.public_key(), Some(sk))
            }
        };
        Ok(ECKey {
            curve,
            key_pair,
            key_id: None,
        })
    }

    pub fn with_key_id(mut self, key_id: &str) -> Self {
        self.key_id = Some(key_id.to_string());
        self
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    fn pair_from_pem(pem: &str, curve: Curve) -> Result<ECKeyPair, Error> {
        let key_pair = match curve {
            Curve::P256 => nist_p256::from_pem(pem).map(|(pk, sk)| ECKeyPair::P256(pk, sk)),
            Curve::P384 => nist_p384::from_pem(pem).map(|(pk, sk)| ECKeyPair::P384(pk, sk)),
            Curve::P521 => nist_p521::from_pem(pem).map(|(pk, sk)| ECKeyPair::P521(pk, sk)),
        };
        key_pair.ok_or_else(|| {
            JWTError::key(format!("not a PEM encoded {} key", curve.name())).into()
        })
    }

    fn pair_from_der(der: &[u8], curve: Curve) -> Result<ECKeyPair, Error> {
        let key_pair = match curve {
            Curve::P256 => nist_p256::from_der(der).map(|(pk, sk)| ECKeyPair::P256(pk, sk)),
            Curve::P384 => nist_p384::from_der(der).map(|(pk, sk)| ECKeyPair::P384(pk, sk)),
            Curve::P521 => nist_p521::from_der(der).map(|(pk, sk)| ECKeyPair::P521(pk, sk)),
        };
        key_pair.ok_or_else(|| {
            JWTError::key(format!("not a DER encoded {} key", curve.name())).into()
        })
    }

    fn pair_from_jwk(
        jwk: &Map<String, Value>,
        curve: Curve,
        algorithm: &str,
    ) -> Result<ECKeyPair, Error> {
        check_jwk(jwk, "EC", algorithm)?;
        let crv = jwk.get("crv").and_then(Value::as_str);
        ensure!(
            crv == Some(curve.name()),
            JWTError::key(format!("{} requires curve {}", algorithm, curve.name()))
        );
        let width = curve.component_len();
        let x = jwk_member(jwk, "x")?;
        let y = jwk_member(jwk, "y")?;
        ensure!(
            x.len() == width && y.len() == width,
            JWTError::key("invalid coordinate length")
        );
        let mut sec1 = Vec::with_capacity(1 + width * 2);
        sec1.push(0x04);
        sec1.extend_from_slice(&x);
        sec1.extend_from_slice(&y);
        let d = optional_jwk_member(jwk, "d")?;
        if let Some(d) = &d {
            ensure!(d.len() == width, JWTError::key("invalid private key length"));
        }

        let invalid_point = || JWTError::key("invalid public point");
        let invalid_scalar = || JWTError::key("invalid private scalar");
        let key_pair = match curve {
            Curve::P256 => {
                let pk = nist_p256::public_from_sec1(&sec1).ok_or_else(invalid_point)?;
                let sk = match &d {
                    Some(d) => Some(nist_p256::secret_from_slice(d).ok_or_else(invalid_scalar)?),
                    None => None,
                };
                if let Some(sk) = &sk {
                    ensure!(sk.public_key() == pk, JWTError::key("d does not match x and y"));
                }
                ECKeyPair::P256(pk, sk)
            }
            Curve::P384 => {
                let pk = nist_p384::public_from_sec1(&sec1).ok_or_else(invalid_point)?;
                let sk = match &d {
                    Some(d) => Some(nist_p384::secret_from_slice(d).ok_or_else(invalid_scalar)?),
                    None => None,
                };
                if let Some(sk) = &sk {
                    ensure!(sk.public_key() == pk, JWTError::key("d does not match x and y"));
                }
                ECKeyPair::P384(pk, sk)
            }
            Curve::P521 => {
                let pk = nist_p521::public_from_sec1(&sec1).ok_or_else(invalid_point)?;
                let sk = match &d {
                    Some(d) => Some(nist_p521::secret_from_slice(d).ok_or_else(invalid_scalar)?),
                    None => None,
                };
                if let Some(sk) = &sk {
                    ensure!(sk.public_key() == pk, JWTError::key("d does not match x and y"));
                }
                ECKeyPair::P521(pk, sk)
            }
        };
        Ok(key_pair)
    }

    fn sec1_public(&self) -> Vec<u8> {
        match &self.key_pair {
            ECKeyPair::P256(pk, _) => nist_p256::sec1_uncompressed(pk),
            ECKeyPair::P384(pk, _) => nist_p384::sec1_uncompressed(pk),
            ECKeyPair::P521(pk, _) => nist_p521::sec1_uncompressed(pk),
        }
    }

    fn secret_scalar(&self) -> Option<Vec<u8>> {
        match &self.key_pair {
            ECKeyPair::P256(_, sk) => sk.as_ref().map(nist_p256::secret_bytes),
            ECKeyPair::P384(_, sk) => sk.as_ref().map(nist_p384::secret_bytes),
            ECKeyPair::P521(_, sk) => sk.as_ref().map(nist_p521::secret_bytes),
        }
    }
}

impl JoseKey for ECKey {
    fn algorithm(&self) -> &str {
        self.curve.algorithm()
    }

    fn sign(&self, signing_input: &[u8]) -> Result<Vec<u8>, Error> {
        let der = match &self.key_pair {
            ECKeyPair::P256(_, Some(sk)) => nist_p256::sign_der(sk, signing_input),
            ECKeyPair::P384(_, Some(sk)) => nist_p384::sign_der(sk, signing_input),
            ECKeyPair::P521(_, Some(sk)) => nist_p521::sign_der(sk, signing_input),
            _ => bail!(JWTError::key("a private key is required to sign")),
        };
        let der = der.ok_or_else(|| JWTError::key("unable to sign with this key"))?;
        der_to_raw(&der, self.curve)
    }

    fn verify(&self, signing_input: &[u8], signature: &[u8]) -> bool {
        let der = match raw_to_der(signature, self.curve) {
            Ok(der) => der,
            Err(_) => return false,
        };
        match &self.key_pair {
            ECKeyPair::P256(pk, _) => nist_p256::verify_der(pk, signing_input, &der),
            ECKeyPair::P384(pk, _) => nist_p384::verify_der(pk, signing_input, &der),
            ECKeyPair::P521(pk, _) => nist_p521::verify_der(pk, signing_input, &der),
        }
    }

    fn is_public(&self) -> bool {
        matches!(
            &self.key_pair,
            ECKeyPair::P256(_, None) | ECKeyPair::P384(_, None) | ECKeyPair::P521(_, None)
        )
    }

    fn public_key(&self) -> Result<Key, Error> {
        let key_pair = match &self.key_pair {
            ECKeyPair::P256(pk, _) => ECKeyPair::P256(pk.clone(), None),
            ECKeyPair::P384(pk, _) => ECKeyPair::P384(pk.clone(), None),
            ECKeyPair::P521(pk, _) => ECKeyPair::P521(pk.clone(), None),
        };
        Ok(Key::Ec(ECKey {
            curve: self.curve,
            key_pair,
            key_id: self.key_id.clone(),
        }))
    }

    fn to_dict(&self) -> Result<Map<String, Value>, Error> {
        let width = self.curve.component_len();
        let sec1 = self.sec1_public();
        let mut jwk = jwk_template("EC", self.algorithm(), self.key_id.as_deref());
        jwk.insert("crv".to_string(), Value::from(self.curve.name()));
        jwk.insert(
            "x".to_string(),
            Value::from(base64url_encode(&sec1[1..1 + width])),
        );
        jwk.insert("y".to_string(), Value::from(base64url_encode(&sec1[1 + width..])));
        if let Some(d) = self.secret_scalar() {
            jwk.insert("d".to_string(), Value::from(base64url_encode(d)));
        }
        Ok(jwk)
    }
}

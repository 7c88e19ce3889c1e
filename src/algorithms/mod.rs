//! Built-in key families and the algorithm identifiers they serve.

mod aes_kw;
mod dir;
mod ecdsa;
mod hmac;
mod rsa;

pub use self::aes_kw::*;
pub use self::dir::*;
pub use self::ecdsa::*;
pub use self::hmac::*;
pub use self::rsa::*;

#[cfg(test)]
pub(crate) use self::rsa::tests as rsa_tests;

pub const HS256: &str = "HS256";
pub const HS384: &str = "HS384";
pub const HS512: &str = "HS512";
pub const RS256: &str = "RS256";
pub const RS384: &str = "RS384";
pub const RS512: &str = "RS512";
pub const PS256: &str = "PS256";
pub const PS384: &str = "PS384";
pub const PS512: &str = "PS512";
pub const ES256: &str = "ES256";
pub const ES384: &str = "ES384";
pub const ES512: &str = "ES512";
pub const A128KW: &str = "A128KW";
pub const A192KW: &str = "A192KW";
pub const A256KW: &str = "A256KW";
pub const DIR: &str = "dir";

pub const HMAC_ALGORITHMS: &[&str] = &[HS256, HS384, HS512];
pub const RSA_ALGORITHMS: &[&str] = &[RS256, RS384, RS512, PS256, PS384, PS512];
pub const EC_ALGORITHMS: &[&str] = &[ES256, ES384, ES512];
pub const AES_ALGORITHMS: &[&str] = &[A128KW, A192KW, A256KW];

/// The closed set of built-in key families.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    Hmac,
    Rsa,
    Ec,
    Aes,
    Dir,
}

impl Family {
    /// The built-in family serving `algorithm`, if any.
    pub fn of(algorithm: &str) -> Option<Family> {
        if HMAC_ALGORITHMS.contains(&algorithm) {
            Some(Family::Hmac)
        } else if RSA_ALGORITHMS.contains(&algorithm) {
            Some(Family::Rsa)
        } else if EC_ALGORITHMS.contains(&algorithm) {
            Some(Family::Ec)
        } else if AES_ALGORITHMS.contains(&algorithm) {
            Some(Family::Aes)
        } else if algorithm == DIR {
            Some(Family::Dir)
        } else {
            None
        }
    }

    /// Whether keys of this family produce JWS signatures.
    ///
    /// AES key wrap and direct keys are key-management keys only.
    pub fn signs(self) -> bool {
        matches!(self, Family::Hmac | Family::Rsa | Family::Ec)
    }

    pub fn algorithms(self) -> &'static [&'static str] {
        match self {
            Family::Hmac => HMAC_ALGORITHMS,
            Family::Rsa => RSA_ALGORITHMS,
            Family::Ec => EC_ALGORITHMS,
            Family::Aes => AES_ALGORITHMS,
            Family::Dir => &[DIR],
        }
    }
}

/// Digest width matched to the strength of a signature algorithm.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HashAlg {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    /// The digest used by `algorithm`, for the HMAC, RSA and EC families.
    pub fn for_algorithm(algorithm: &str) -> Option<HashAlg> {
        match Family::of(algorithm) {
            Some(Family::Hmac) | Some(Family::Rsa) | Some(Family::Ec) => {}
            _ => return None,
        }
        if algorithm.ends_with("256") {
            Some(HashAlg::Sha256)
        } else if algorithm.ends_with("384") {
            Some(HashAlg::Sha384)
        } else if algorithm.ends_with("512") {
            Some(HashAlg::Sha512)
        } else {
            None
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlg::Sha256 => hmac_sha256::Hash::hash(data).to_vec(),
            HashAlg::Sha384 => hmac_sha512::sha384::Hash::hash(data).to_vec(),
            HashAlg::Sha512 => hmac_sha512::Hash::hash(data).to_vec(),
        }
    }
}

#[test]
fn families() {
    assert_eq!(Family::of("HS384"), Some(Family::Hmac));
    assert_eq!(Family::of("PS512"), Some(Family::Rsa));
    assert_eq!(Family::of("ES512"), Some(Family::Ec));
    assert_eq!(Family::of("A192KW"), Some(Family::Aes));
    assert_eq!(Family::of("dir"), Some(Family::Dir));
    assert_eq!(Family::of("DIR"), None);
    assert_eq!(Family::of("none"), None);
    assert!(!Family::Aes.signs());
    assert!(Family::Ec.signs());
}

#[test]
fn digest_widths() {
    assert_eq!(HashAlg::for_algorithm("RS384"), Some(HashAlg::Sha384));
    assert_eq!(HashAlg::for_algorithm("ES512"), Some(HashAlg::Sha512));
    assert_eq!(HashAlg::for_algorithm("A256KW"), None);
    assert_eq!(HashAlg::Sha256.digest(b"abc").len(), 32);
    assert_eq!(HashAlg::Sha384.digest(b"abc").len(), 48);
    assert_eq!(HashAlg::Sha512.digest(b"abc").len(), 64);
}

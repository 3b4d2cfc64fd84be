//! JSON Web Key conversion
//!
//! Binary values are base64url without padding (RFC 7518). [`AzureJwk`] is
//! the shape Key Vault accepts on key import, which adds `key_ops` derived
//! from the key type.

use super::{KeyMaterialError, PrivateKey};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

/// Key Vault import form of a JWK
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureJwk {
    pub kty: String,
    pub key_ops: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

const SUPPORTED_CURVES: [&str; 3] = ["P-256", "P-384", "P-521"];

fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn ec_jwk(crv: &str, x: Option<&[u8]>, y: Option<&[u8]>, d: &[u8]) -> Result<Jwk, KeyMaterialError> {
    let (x, y) = match (x, y) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(KeyMaterialError::UnsupportedKey(
                "EC public point has no affine coordinates".to_string(),
            ))
        }
    };
    Ok(Jwk {
        kty: "EC".to_string(),
        crv: Some(crv.to_string()),
        x: Some(b64(x)),
        y: Some(b64(y)),
        d: Some(b64(d)),
        ..Default::default()
    })
}

/// Convert a private key to its JWK form, including CRT parameters for RSA
pub fn to_jwk(key: &PrivateKey) -> Result<Jwk, KeyMaterialError> {
    match key {
        PrivateKey::Rsa(rsa_key) => {
            let mut rsa_key = rsa_key.clone();
            rsa_key
                .precompute()
                .map_err(|e| KeyMaterialError::UnsupportedKey(format!("RSA precompute: {}", e)))?;

            let primes = rsa_key.primes();
            if primes.len() != 2 {
                return Err(KeyMaterialError::UnsupportedKey(format!(
                    "multi-prime RSA keys are not supported ({} primes)",
                    primes.len()
                )));
            }
            let (dp, dq, qinv) = match (rsa_key.dp(), rsa_key.dq(), rsa_key.qinv()) {
                (Some(dp), Some(dq), Some(qinv)) => (dp, dq, qinv),
                _ => {
                    return Err(KeyMaterialError::UnsupportedKey(
                        "RSA key is missing CRT parameters".to_string(),
                    ))
                }
            };
            let (_, qinv_bytes) = qinv.to_bytes_be();

            Ok(Jwk {
                kty: "RSA".to_string(),
                n: Some(b64(&rsa_key.n().to_bytes_be())),
                e: Some(b64(&rsa_key.e().to_bytes_be())),
                d: Some(b64(&rsa_key.d().to_bytes_be())),
                p: Some(b64(&primes[0].to_bytes_be())),
                q: Some(b64(&primes[1].to_bytes_be())),
                dp: Some(b64(&dp.to_bytes_be())),
                dq: Some(b64(&dq.to_bytes_be())),
                qi: Some(b64(&qinv_bytes)),
                ..Default::default()
            })
        }
        PrivateKey::P256(secret) => {
            let point = secret.public_key().to_encoded_point(false);
            ec_jwk(
                "P-256",
                point.x().map(|v| v.as_slice()),
                point.y().map(|v| v.as_slice()),
                secret.to_bytes().as_slice(),
            )
        }
        PrivateKey::P384(secret) => {
            let point = secret.public_key().to_encoded_point(false);
            ec_jwk(
                "P-384",
                point.x().map(|v| v.as_slice()),
                point.y().map(|v| v.as_slice()),
                secret.to_bytes().as_slice(),
            )
        }
        PrivateKey::P521(secret) => {
            let point = secret.public_key().to_encoded_point(false);
            ec_jwk(
                "P-521",
                point.x().map(|v| v.as_slice()),
                point.y().map(|v| v.as_slice()),
                secret.to_bytes().as_slice(),
            )
        }
    }
}

/// Map a stored JWK into the Key Vault import form
pub fn from_jwk_set(jwk: &Jwk) -> Result<AzureJwk, KeyMaterialError> {
    let ops = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    match jwk.kty.as_str() {
        "RSA" => Ok(AzureJwk {
            kty: "RSA".to_string(),
            key_ops: ops(&["encrypt", "decrypt", "sign", "verify", "wrapKey", "unwrapKey"]),
            n: jwk.n.clone(),
            e: jwk.e.clone(),
            d: jwk.d.clone(),
            p: jwk.p.clone(),
            q: jwk.q.clone(),
            dp: jwk.dp.clone(),
            dq: jwk.dq.clone(),
            qi: jwk.qi.clone(),
            ..Default::default()
        }),
        "EC" => {
            let crv = jwk.crv.clone().unwrap_or_default();
            if !SUPPORTED_CURVES.contains(&crv.as_str()) {
                return Err(KeyMaterialError::UnsupportedCurve(crv));
            }
            Ok(AzureJwk {
                kty: "EC".to_string(),
                key_ops: ops(&["sign", "verify"]),
                crv: Some(crv),
                x: jwk.x.clone(),
                y: jwk.y.clone(),
                d: jwk.d.clone(),
                ..Default::default()
            })
        }
        "oct" => Ok(AzureJwk {
            kty: "oct".to_string(),
            key_ops: ops(&["encrypt", "decrypt", "wrapKey", "unwrapKey"]),
            k: jwk.k.clone(),
            ..Default::default()
        }),
        other => Err(KeyMaterialError::UnsupportedKey(format!(
            "unsupported JWK key type '{}'",
            other
        ))),
    }
}

/// Wrap raw AES key bytes into an `oct` JWK
pub fn import_symmetric(bytes: &[u8]) -> Result<Jwk, KeyMaterialError> {
    let bits = bytes.len() * 8;
    if !matches!(bits, 128 | 192 | 256) {
        return Err(KeyMaterialError::InvalidKeyLength { bits });
    }
    Ok(Jwk {
        kty: "oct".to_string(),
        k: Some(b64(bytes)),
        ..Default::default()
    })
}

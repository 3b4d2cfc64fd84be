//! PKCS#12 bundle decoding

use super::{private_key_from_pkcs8_der, KeyMaterialError, PrivateKey};

/// Contents of a PKCS#12 bundle: the private key, its leaf certificate and
/// any further certificates (DER)
#[derive(Debug)]
pub struct Pkcs12Bundle {
    pub key: PrivateKey,
    pub certificate: Vec<u8>,
    pub chain: Vec<Vec<u8>>,
}

pub fn pkcs12_decode(bytes: &[u8], password: &str) -> Result<Pkcs12Bundle, KeyMaterialError> {
    let pfx = p12::PFX::parse(bytes)
        .map_err(|e| KeyMaterialError::MalformedPkcs12(format!("{:?}", e)))?;

    if !pfx.verify_mac(password) {
        return Err(KeyMaterialError::WrongPassword);
    }

    let keys = pfx
        .key_bags(password)
        .map_err(|_| KeyMaterialError::WrongPassword)?;
    let key_der = keys.first().ok_or_else(|| {
        KeyMaterialError::MalformedPkcs12("bundle contains no private key".to_string())
    })?;
    let key = private_key_from_pkcs8_der(key_der)?;

    let mut certificates = pfx
        .cert_x509_bags(password)
        .map_err(|_| KeyMaterialError::WrongPassword)?
        .into_iter();
    let certificate = certificates.next().ok_or_else(|| {
        KeyMaterialError::MalformedPkcs12("bundle contains no certificate".to_string())
    })?;

    Ok(Pkcs12Bundle {
        key,
        certificate,
        chain: certificates.collect(),
    })
}

//! RSA-OAEP-SHA256 key wrapping
//!
//! Small payloads are sealed directly with RSA-OAEP; larger ones wrap a
//! gzipped AES content-encryption key. Both paths use SHA-256 for the OAEP
//! hash and MGF1, and no label.

use crate::helpers::CryptoError;
use rand::rngs::OsRng;
use rsa::{pkcs8::DecodePublicKey, traits::PublicKeyParts, Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// Output size of the OAEP hash (SHA-256)
pub const OAEP_HASH_LEN: usize = 32;

/// RSA modulus size in bytes (`k`)
pub fn rsa_modulus_bytes(public_key: &RsaPublicKey) -> usize {
    public_key.size()
}

/// Largest plaintext RSA-OAEP-SHA256 can seal under this key: `k - 2*hLen - 2`
pub fn max_oaep_plaintext(public_key: &RsaPublicKey) -> usize {
    rsa_modulus_bytes(public_key).saturating_sub(2 * OAEP_HASH_LEN + 2)
}

pub fn rsa_oaep_encrypt(public_key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let max = max_oaep_plaintext(public_key);
    if data.len() > max {
        return Err(CryptoError::PlaintextTooLong {
            len: data.len(),
            max,
        });
    }
    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)
        .map_err(|e| CryptoError::RsaEncrypt(e.to_string()))
}

pub fn rsa_oaep_decrypt(
    private_key: &RsaPrivateKey,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    private_key
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|e| CryptoError::RsaDecrypt(e.to_string()))
}

/// Parse an SPKI (`PUBLIC KEY`) PEM into an RSA public key
pub fn rsa_public_key_from_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| CryptoError::RsaEncrypt(format!("Failed to parse RSA public key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::DecodeRsaPrivateKey;

    const RSA_2048_PKCS1: &str = include_str!("../../../../tests/data/rsa2048_pkcs1.pem");

    fn test_keypair() -> (RsaPublicKey, RsaPrivateKey) {
        let private_key = RsaPrivateKey::from_pkcs1_pem(RSA_2048_PKCS1).unwrap();
        (RsaPublicKey::from(&private_key), private_key)
    }

    #[test]
    fn test_rsa_oaep_roundtrip() {
        let (public_key, private_key) = test_keypair();
        let key = b"test_payload_key_32_bytes_long!";

        let wrapped = rsa_oaep_encrypt(&public_key, key).unwrap();
        assert_eq!(wrapped.len(), 256);
        let unwrapped = rsa_oaep_decrypt(&private_key, &wrapped).unwrap();
        assert_eq!(key, unwrapped.as_slice());
    }

    #[test]
    fn test_threshold_for_2048_bit_key() {
        let (public_key, _) = test_keypair();
        assert_eq!(rsa_modulus_bytes(&public_key), 256);
        assert_eq!(max_oaep_plaintext(&public_key), 190);
    }

    #[test]
    fn test_rsa_oaep_varied_payload_sizes() {
        let (public_key, private_key) = test_keypair();
        for size in [0usize, 1, 16, 32, 190] {
            let data = vec![0x42u8; size];
            let wrapped = rsa_oaep_encrypt(&public_key, &data).unwrap();
            assert_eq!(rsa_oaep_decrypt(&private_key, &wrapped).unwrap(), data);
        }
    }

    #[test]
    fn test_oversized_plaintext_rejected() {
        let (public_key, _) = test_keypair();
        let result = rsa_oaep_encrypt(&public_key, &[0u8; 191]);
        assert!(matches!(
            result,
            Err(CryptoError::PlaintextTooLong { len: 191, max: 190 })
        ));
    }

    #[test]
    fn test_rsa_unwrap_invalid_ciphertext() {
        let (public_key, private_key) = test_keypair();
        let mut wrapped = rsa_oaep_encrypt(&public_key, b"key").unwrap();
        wrapped[10] ^= 0xFF;
        assert!(rsa_oaep_decrypt(&private_key, &wrapped).is_err());
    }

    #[test]
    fn test_rsa_invalid_pem_format() {
        assert!(rsa_public_key_from_pem("not a valid pem").is_err());
        assert!(rsa_public_key_from_pem("-----BEGIN PUBLIC KEY-----\nAAAA").is_err());
        assert!(rsa_public_key_from_pem("").is_err());
    }
}

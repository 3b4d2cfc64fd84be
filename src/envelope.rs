//! Envelope seal and open
//!
//! Payloads up to `k - 66` bytes (the RSA-OAEP-SHA256 limit for a `k`-byte
//! modulus) are sealed directly under RSA. Anything larger is sealed with a
//! fresh AES-256-GCM key whose parameters travel gzipped and RSA-wrapped in
//! the CEK slot.
//!
//! # Example
//!
//! ```no_run
//! use az_confidential::envelope::{decrypt_envelope, encrypt_envelope};
//! use az_confidential::ports::RsaPrivateKeyDecrypter;
//! use az_confidential::crypto::public_key_from_pem;
//!
//! # async fn example(private_pem: &[u8], public_pem: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let public_key = public_key_from_pem(public_pem)?;
//! let decrypter = RsaPrivateKeyDecrypter::from_pem(private_pem, None)?;
//! let envelope = encrypt_envelope(&public_key, b"hello")?;
//! let plaintext = decrypt_envelope(&envelope, &decrypter).await?;
//! assert_eq!(plaintext, b"hello");
//! # Ok(())
//! # }
//! ```

use crate::ports::RsaDecrypter;
use crate::ConfidentialError;
use confidential_crypto::rsa::RsaPublicKey;
use confidential_crypto::{
    aes_gcm_open, aes_gcm_seal, generate_aad, generate_aes_key, generate_nonce, gzip_compress,
    gzip_decompress, max_oaep_plaintext, rsa_oaep_encrypt, AesKey, Nonce96,
};
use confidential_protocol::{AesData, Envelope};
use tracing::debug;

/// Seal `plaintext` for the holder of `public_key`'s private half
pub fn encrypt_envelope(
    public_key: &RsaPublicKey,
    plaintext: &[u8],
) -> Result<Envelope, ConfidentialError> {
    let threshold = max_oaep_plaintext(public_key);

    if plaintext.len() <= threshold {
        debug!(has_cek = false, len = plaintext.len(), "sealing envelope");
        let ciphertext = rsa_oaep_encrypt(public_key, plaintext)?;
        return Ok(Envelope::direct(ciphertext));
    }

    debug!(has_cek = true, len = plaintext.len(), "sealing envelope");
    let key = generate_aes_key()?;
    let iv = generate_nonce()?;
    let aad = generate_aad()?;

    let sealed = aes_gcm_seal(&key, &iv, aad.as_slice(), plaintext)?;
    let mut ciphertext = Vec::with_capacity(iv.as_slice().len() + aad.as_slice().len() + sealed.len());
    ciphertext.extend_from_slice(iv.as_slice());
    ciphertext.extend_from_slice(aad.as_slice());
    ciphertext.extend_from_slice(&sealed);

    let aes_data = AesData::new(iv.as_slice(), key.as_slice(), aad.as_slice())?;
    let cek_plain = gzip_compress(&aes_data.to_json()?)?;
    let cek = rsa_oaep_encrypt(public_key, &cek_plain)?;

    Ok(Envelope::hybrid(cek, ciphertext))
}

/// Open an envelope through a decryption capability
pub async fn decrypt_envelope(
    envelope: &Envelope,
    decrypter: &dyn RsaDecrypter,
) -> Result<Vec<u8>, ConfidentialError> {
    let cek = match envelope.cek() {
        None => {
            debug!(has_cek = false, "opening envelope");
            return Ok(decrypter.decrypt(envelope.ciphertext()).await?);
        }
        Some(cek) => cek,
    };

    debug!(has_cek = true, "opening envelope");
    let cek_plain = decrypter.decrypt(cek).await?;
    let aes_data = AesData::from_json(&gzip_decompress(&cek_plain)?)?;

    let (iv, aad, sealed) = envelope.split_hybrid()?;
    let key = AesKey::from_slice(&aes_data.key)?;
    let iv = Nonce96::from_slice(iv)?;

    Ok(aes_gcm_open(&key, &iv, aad, sealed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::DecrypterError;
    use confidential_crypto::rsa::{pkcs1::DecodeRsaPrivateKey, RsaPrivateKey};
    use confidential_crypto::{rsa_oaep_decrypt, CryptoError};

    const RSA_2048: &str = include_str!("../tests/data/rsa2048_pkcs1.pem");

    fn keypair() -> (RsaPublicKey, RsaPrivateKey) {
        let private_key = RsaPrivateKey::from_pkcs1_pem(RSA_2048).unwrap();
        (RsaPublicKey::from(&private_key), private_key)
    }

    fn decrypter(key: RsaPrivateKey) -> impl Fn(&[u8]) -> Result<Vec<u8>, DecrypterError> {
        move |ciphertext: &[u8]| {
            rsa_oaep_decrypt(&key, ciphertext).map_err(|e| DecrypterError::Decryption(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let (public_key, private_key) = keypair();
        let decrypter = decrypter(private_key);

        let at_limit = vec![0x41u8; 190];
        let envelope = encrypt_envelope(&public_key, &at_limit).unwrap();
        assert!(!envelope.has_cek());
        assert_eq!(envelope.ciphertext().len(), 256);
        assert_eq!(decrypt_envelope(&envelope, &decrypter).await.unwrap(), at_limit);

        let over_limit = vec![0x42u8; 191];
        let envelope = encrypt_envelope(&public_key, &over_limit).unwrap();
        assert!(envelope.has_cek());
        assert_eq!(envelope.cek().unwrap().len(), 256);
        assert_eq!(envelope.ciphertext().len(), 12 + 12 + 191 + 16);
        assert_eq!(decrypt_envelope(&envelope, &decrypter).await.unwrap(), over_limit);
    }

    #[tokio::test]
    async fn test_empty_plaintext() {
        let (public_key, private_key) = keypair();
        let envelope = encrypt_envelope(&public_key, b"").unwrap();
        assert!(!envelope.has_cek());
        let opened = decrypt_envelope(&envelope, &decrypter(private_key)).await.unwrap();
        assert!(opened.is_empty());
    }

    #[tokio::test]
    async fn test_tampered_hybrid_fails_authentication() {
        let (public_key, private_key) = keypair();
        let decrypter = decrypter(private_key);
        let envelope = encrypt_envelope(&public_key, &[7u8; 1024]).unwrap();

        // byte 12 is the first AAD byte, byte 40 lies in the GCM ciphertext
        for position in [12usize, 40] {
            let mut ciphertext = envelope.ciphertext().to_vec();
            ciphertext[position] ^= 0x01;
            let tampered = Envelope::hybrid(envelope.cek().unwrap().to_vec(), ciphertext);
            let err = decrypt_envelope(&tampered, &decrypter).await.unwrap_err();
            assert!(matches!(
                err,
                ConfidentialError::Crypto(CryptoError::AuthenticationFailed)
            ));
        }
    }

    #[tokio::test]
    async fn test_decrypter_failure_propagates() {
        let (public_key, _) = keypair();
        let envelope = encrypt_envelope(&public_key, b"hello").unwrap();
        let offline = |_: &[u8]| -> Result<Vec<u8>, DecrypterError> {
            Err(DecrypterError::Unavailable("hsm offline".to_string()))
        };
        let err = decrypt_envelope(&envelope, &offline).await.unwrap_err();
        assert!(matches!(err, ConfidentialError::Decrypter(_)));
        assert!(err.is_retryable());
    }
}

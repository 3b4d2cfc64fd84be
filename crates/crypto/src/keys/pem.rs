//! PEM block parsing and private/public key decoding

use super::{private_key_from_pkcs8_der, KeyMaterialError, PrivateKey};
use rsa::{pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePublicKey, RsaPrivateKey, RsaPublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

const BEGIN_PREFIX: &str = "-----BEGIN ";
const MARKER_SUFFIX: &str = "-----";

const PRIVATE_KEY_LABELS: [&str; 4] = [
    "PRIVATE KEY",
    "ENCRYPTED PRIVATE KEY",
    "EC PRIVATE KEY",
    "RSA PRIVATE KEY",
];

/// One decoded PEM block: the type label and the DER contents
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PemBlock {
    pub label: String,
    pub contents: Vec<u8>,
}

impl std::fmt::Debug for PemBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemBlock")
            .field("label", &self.label)
            .field("len", &self.contents.len())
            .finish()
    }
}

/// Parse every PEM block in `input`
///
/// Only whitespace may appear between blocks; any other stray data means the
/// input is not a clean PEM file and is rejected.
pub fn parse_pem_blocks(input: &[u8]) -> Result<Vec<PemBlock>, KeyMaterialError> {
    let text = std::str::from_utf8(input)
        .map_err(|_| KeyMaterialError::MalformedPem("input is not valid UTF-8".to_string()))?;

    let mut blocks = Vec::new();
    let mut rest = text;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        if !trimmed.starts_with(BEGIN_PREFIX) {
            return Err(KeyMaterialError::MalformedPem(
                "unexpected data outside of a PEM block".to_string(),
            ));
        }

        let after_begin = &trimmed[BEGIN_PREFIX.len()..];
        let label_len = after_begin.find(MARKER_SUFFIX).ok_or_else(|| {
            KeyMaterialError::MalformedPem("unterminated BEGIN marker".to_string())
        })?;
        let label = &after_begin[..label_len];
        let end_marker = format!("-----END {}-----", label);
        let end = trimmed.find(&end_marker).ok_or_else(|| {
            KeyMaterialError::MalformedPem(format!("missing END marker for {}", label))
        })?;
        let block_end = end + end_marker.len();

        let parsed = pem::parse(&trimmed[..block_end])
            .map_err(|e| KeyMaterialError::MalformedPem(e.to_string()))?;
        blocks.push(PemBlock {
            label: parsed.tag().to_string(),
            contents: parsed.contents().to_vec(),
        });

        rest = &trimmed[block_end..];
    }

    if blocks.is_empty() {
        return Err(KeyMaterialError::MalformedPem(
            "no PEM blocks found".to_string(),
        ));
    }
    Ok(blocks)
}

pub fn find_private_key_block(blocks: &[PemBlock]) -> Option<&PemBlock> {
    blocks
        .iter()
        .find(|b| PRIVATE_KEY_LABELS.contains(&b.label.as_str()))
}

pub fn find_certificate_blocks(blocks: &[PemBlock]) -> Vec<&PemBlock> {
    blocks.iter().filter(|b| b.label == "CERTIFICATE").collect()
}

/// Decode an unencrypted private key block
pub fn private_key_from_block(block: &PemBlock) -> Result<PrivateKey, KeyMaterialError> {
    match block.label.as_str() {
        "PRIVATE KEY" => private_key_from_pkcs8_der(&block.contents),
        "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(&block.contents)
            .map(PrivateKey::Rsa)
            .map_err(|e| KeyMaterialError::UnsupportedKey(format!("PKCS#1: {}", e))),
        "EC PRIVATE KEY" => ec_private_key_from_sec1_der(&block.contents),
        "ENCRYPTED PRIVATE KEY" => Err(KeyMaterialError::UnsupportedKey(
            "key is encrypted; a password is required".to_string(),
        )),
        other => Err(KeyMaterialError::UnsupportedKey(format!(
            "unsupported PEM label '{}'",
            other
        ))),
    }
}

/// Decrypt and decode an `ENCRYPTED PRIVATE KEY` (PKCS#8) block
pub fn private_key_from_encrypted_block(
    block: &PemBlock,
    password: &str,
) -> Result<PrivateKey, KeyMaterialError> {
    if block.label != "ENCRYPTED PRIVATE KEY" {
        return Err(KeyMaterialError::UnsupportedKey(format!(
            "expected ENCRYPTED PRIVATE KEY, found '{}'",
            block.label
        )));
    }
    let info = pkcs8::EncryptedPrivateKeyInfo::try_from(block.contents.as_slice())
        .map_err(|e| KeyMaterialError::UnsupportedKey(format!("encrypted PKCS#8: {}", e)))?;
    let document = info
        .decrypt(password)
        .map_err(|_| KeyMaterialError::WrongPassword)?;
    private_key_from_pkcs8_der(document.as_bytes())
}

/// Locate the private key in a PEM file and decode it, decrypting when a
/// password is supplied and the block is encrypted
pub fn private_key_from_pem(
    input: &[u8],
    password: Option<&str>,
) -> Result<PrivateKey, KeyMaterialError> {
    let blocks = parse_pem_blocks(input)?;
    let block = find_private_key_block(&blocks).ok_or_else(|| {
        KeyMaterialError::UnsupportedKey("no private key block in PEM input".to_string())
    })?;
    match (block.label.as_str(), password) {
        ("ENCRYPTED PRIVATE KEY", Some(password)) => {
            private_key_from_encrypted_block(block, password)
        }
        _ => private_key_from_block(block),
    }
}

/// Parse an RSA public key from a `PUBLIC KEY` (SPKI) PEM
pub fn public_key_from_pem(input: &[u8]) -> Result<RsaPublicKey, KeyMaterialError> {
    let blocks = parse_pem_blocks(input)?;
    let block = blocks
        .iter()
        .find(|b| b.label == "PUBLIC KEY")
        .ok_or_else(|| {
            KeyMaterialError::UnsupportedKey("expected a PUBLIC KEY block".to_string())
        })?;
    RsaPublicKey::from_public_key_der(&block.contents)
        .map_err(|e| KeyMaterialError::UnsupportedKey(format!("RSA public key: {}", e)))
}

fn ec_private_key_from_sec1_der(der: &[u8]) -> Result<PrivateKey, KeyMaterialError> {
    if let Ok(key) = p256::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::P256(key));
    }
    if let Ok(key) = p384::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::P384(key));
    }
    if let Ok(key) = p521::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::P521(key));
    }
    Err(KeyMaterialError::UnsupportedKey(
        "SEC1 key is not on P-256, P-384 or P-521".to_string(),
    ))
}

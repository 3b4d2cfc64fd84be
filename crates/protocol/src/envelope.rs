//! Binary envelope layout
//!
//! ```text
//! magic(4)      "CENV"
//! version(1)    0x01
//! flags(1)      bit0 = hasCEK, other bits reserved (must be zero)
//! ceklen(2, BE) 0 when !hasCEK
//! cek(ceklen)   RSA-OAEP(gzip(json(AesData)))
//! ctlen(4, BE)
//! ciphertext    RSA-OAEP(payload) when !hasCEK,
//!               iv(12) || aad(12) || AES-256-GCM(payload) otherwise
//! ```

use crate::binary::{
    read_bytes, read_u16_be, read_u32_be, read_u8, write_bytes, write_len_u16, write_len_u32,
    write_u8, BinaryRead, BinaryWrite,
};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const ENVELOPE_MAGIC: [u8; 4] = *b"CENV";
pub const ENVELOPE_VERSION: u8 = 0x01;
pub const FLAG_HAS_CEK: u8 = 0b0000_0001;
const KNOWN_FLAGS: u8 = FLAG_HAS_CEK;

/// magic + version + flags + ceklen + ctlen
pub const ENVELOPE_FIXED_SIZE: usize = 4 + 1 + 1 + 2 + 4;

/// IV and AAD prefix carried in front of the GCM output in hybrid envelopes
pub const HYBRID_PREFIX_SIZE: usize = AES_IV_SIZE + AES_AAD_SIZE;

pub const AES_IV_SIZE: usize = 12;
pub const AES_KEY_SIZE: usize = 32;
pub const AES_AAD_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Malformed armor: {0}")]
    MalformedArmor(String),

    #[error("Unknown envelope version: {0}")]
    UnknownEnvelopeVersion(String),

    #[error("Truncated envelope: {0}")]
    Truncated(String),

    #[error("Malformed envelope: {0}")]
    Malformed(String),

    #[error("Envelope has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("Invalid content-encryption key data: {0}")]
    InvalidAesData(String),
}

impl From<io::Error> for EnvelopeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => EnvelopeError::Truncated(err.to_string()),
            _ => EnvelopeError::Malformed(err.to_string()),
        }
    }
}

/// A parsed envelope; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    cek: Option<Vec<u8>>,
    ciphertext: Vec<u8>,
}

impl Envelope {
    /// Envelope whose ciphertext is the RSA-OAEP output itself
    pub fn direct(ciphertext: Vec<u8>) -> Self {
        Self {
            cek: None,
            ciphertext,
        }
    }

    /// Envelope carrying a wrapped content-encryption key
    pub fn hybrid(cek: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self {
            cek: Some(cek),
            ciphertext,
        }
    }

    pub fn has_cek(&self) -> bool {
        self.cek.is_some()
    }

    pub fn cek(&self) -> Option<&[u8]> {
        self.cek.as_deref()
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn flags(&self) -> u8 {
        if self.has_cek() {
            FLAG_HAS_CEK
        } else {
            0
        }
    }

    /// Split a hybrid ciphertext into `(iv, aad, sealed)`
    pub fn split_hybrid(&self) -> Result<(&[u8], &[u8], &[u8]), EnvelopeError> {
        if !self.has_cek() {
            return Err(EnvelopeError::Malformed(
                "ciphertext is not AES-sealed".to_string(),
            ));
        }
        if self.ciphertext.len() < HYBRID_PREFIX_SIZE {
            return Err(EnvelopeError::Truncated(format!(
                "hybrid ciphertext is {} bytes, shorter than its {}-byte IV/AAD prefix",
                self.ciphertext.len(),
                HYBRID_PREFIX_SIZE
            )));
        }
        let (iv, rest) = self.ciphertext.split_at(AES_IV_SIZE);
        let (aad, sealed) = rest.split_at(AES_AAD_SIZE);
        Ok((iv, aad, sealed))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(self.to_vec()?)
    }

    /// Strict decode: the whole input must be exactly one envelope
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < ENVELOPE_MAGIC.len() + 1 {
            return Err(EnvelopeError::Truncated(format!(
                "{} bytes is too short for an envelope",
                bytes.len()
            )));
        }
        if bytes[..4] != ENVELOPE_MAGIC || bytes[4] != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnknownEnvelopeVersion(format!(
                "prefix {:02X?}, expected {:02X?} version {:02X}",
                &bytes[..5],
                ENVELOPE_MAGIC,
                ENVELOPE_VERSION
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let envelope = Self::read_from(&mut cursor)?;
        let consumed = cursor.position() as usize;
        if consumed != bytes.len() {
            return Err(EnvelopeError::TrailingBytes(bytes.len() - consumed));
        }
        Ok(envelope)
    }
}

impl BinaryRead for Envelope {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        let version = read_u8(reader)?;
        if magic != ENVELOPE_MAGIC || version != ENVELOPE_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid envelope magic/version: {:02X?} {:02X}", magic, version),
            ));
        }

        let flags = read_u8(reader)?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown envelope flags: {:08b}", flags),
            ));
        }
        let has_cek = flags & FLAG_HAS_CEK != 0;

        let cek_len = read_u16_be(reader)? as usize;
        let cek = match (has_cek, cek_len) {
            (false, 0) => None,
            (false, n) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Envelope without CEK declares a {}-byte CEK", n),
                ))
            }
            (true, 0) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Envelope flags a CEK but its length is zero",
                ))
            }
            (true, n) => Some(read_bytes(reader, n)?),
        };

        let ct_len = read_u32_be(reader)? as usize;
        let ciphertext = read_bytes(reader, ct_len)?;

        Ok(Self { cek, ciphertext })
    }
}

impl BinaryWrite for Envelope {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &ENVELOPE_MAGIC)?;
        write_u8(writer, ENVELOPE_VERSION)?;
        write_u8(writer, self.flags())?;
        match &self.cek {
            Some(cek) => {
                write_len_u16(writer, cek.len())?;
                write_bytes(writer, cek)?;
            }
            None => write_len_u16(writer, 0)?,
        }
        write_len_u32(writer, self.ciphertext.len())?;
        write_bytes(writer, &self.ciphertext)
    }

    fn serialized_size(&self) -> usize {
        ENVELOPE_FIXED_SIZE + self.cek.as_ref().map_or(0, Vec::len) + self.ciphertext.len()
    }
}

/// AES parameters carried (gzipped, RSA-wrapped) in the CEK slot
#[serde_as]
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AesData {
    #[serde_as(as = "Base64")]
    pub iv: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub key: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub aad: Vec<u8>,
}

impl std::fmt::Debug for AesData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesData")
            .field("iv_len", &self.iv.len())
            .field("key", &"[REDACTED]")
            .field("aad_len", &self.aad.len())
            .finish()
    }
}

impl AesData {
    pub fn new(iv: &[u8], key: &[u8], aad: &[u8]) -> Result<Self, EnvelopeError> {
        let data = Self {
            iv: iv.to_vec(),
            key: key.to_vec(),
            aad: aad.to_vec(),
        };
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<(), EnvelopeError> {
        for (field, len, expected) in [
            ("iv", self.iv.len(), AES_IV_SIZE),
            ("key", self.key.len(), AES_KEY_SIZE),
            ("aad", self.aad.len(), AES_AAD_SIZE),
        ] {
            if len != expected {
                return Err(EnvelopeError::InvalidAesData(format!(
                    "{} is {} bytes, expected {}",
                    field, len, expected
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::InvalidAesData(e.to_string()))
    }

    pub fn from_json(json: &[u8]) -> Result<Self, EnvelopeError> {
        let data: Self =
            serde_json::from_slice(json).map_err(|e| EnvelopeError::InvalidAesData(e.to_string()))?;
        data.validate()?;
        Ok(data)
    }
}

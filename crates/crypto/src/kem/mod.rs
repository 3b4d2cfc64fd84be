//! Key encapsulation
//!
//! Only RSA-OAEP is supported as a wrapping mechanism; the engine consumes
//! the private half through a decryption capability rather than key bytes.

pub mod rsa;

pub use self::rsa::{
    max_oaep_plaintext, rsa_modulus_bytes, rsa_oaep_decrypt, rsa_oaep_encrypt,
    rsa_public_key_from_pem, OAEP_HASH_LEN,
};

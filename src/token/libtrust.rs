//! Key ids in the format the distribution registry expects in the `kid`
//! header: the SHA-256 of the DER public key, truncated to 240 bits,
//! base32-encoded and split in colon-separated groups of four.

use data_encoding::BASE32_NOPAD;
use rsa::pkcs8::EncodePublicKey;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

use crate::token::Error;

pub fn key_id(public_key: &RsaPublicKey) -> Result<String, Error> {
    let der = public_key
        .to_public_key_der()
        .map_err(|error| Error::Key(format!("Unable to encode public key: {error}")))?;

    let digest = Sha256::digest(der.as_bytes());
    Ok(format_key_id(&digest[..30]))
}

fn format_key_id(hash: &[u8]) -> String {
    let encoded = BASE32_NOPAD.encode(hash);

    let mut key_id = String::with_capacity(encoded.len() + encoded.len() / 4);
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            key_id.push(':');
        }
        key_id.push(c);
    }
    key_id
}

//! CityTag's symmetric request/response envelope.
//!
//! Payloads travel as base64-encoded 3DES-ECB ciphertext keyed from the
//! current session token, so a session refresh invalidates every earlier
//! request's intelligibility. ECB means identical plaintext blocks produce
//! identical ciphertext blocks; that determinism is an interop requirement
//! of the provider's protocol, not a security property of this codec.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use des::TdesEde3;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, block_padding::Pkcs7};
use serde_json::Value;

use crate::{CityTagError, CityTagResult};

const BLOCK_SIZE: usize = 8;
const KEY_SIZE: usize = 24;

type EnvelopeEncryptor = ecb::Encryptor<TdesEde3>;
type EnvelopeDecryptor = ecb::Decryptor<TdesEde3>;

/// Derive the 24-byte 3DES key from a session token.
///
/// Tokens of exactly 16 or 24 bytes are used as-is (a 16-byte token is the
/// two-key K1·K2·K1 form); anything else is padded with ASCII `'0'` and
/// truncated to 24 bytes. Each byte then gets the 3DES odd-parity
/// adjustment. Deterministic for a given token.
pub fn derive_key(token: &str) -> [u8; KEY_SIZE] {
    let bytes = token.as_bytes();
    let mut key = [0u8; KEY_SIZE];

    match bytes.len() {
        16 => {
            key[..16].copy_from_slice(bytes);
            key[16..].copy_from_slice(&bytes[..8]);
        }
        KEY_SIZE => key.copy_from_slice(bytes),
        _ => {
            for (slot, byte) in key.iter_mut().zip(bytes.iter().chain(std::iter::repeat(&b'0'))) {
                *slot = *byte;
            }
        }
    }

    for byte in &mut key {
        *byte = with_odd_parity(*byte);
    }
    key
}

/// Serialize `payload` to compact JSON, PKCS#7-pad, 3DES-ECB encrypt and
/// base64-encode. Deterministic for a (payload, token) pair — there is no
/// nonce or IV, so repeated identical payloads yield identical ciphertext.
pub fn encrypt_payload(payload: &Value, token: &str) -> CityTagResult<String> {
    let key = derive_key(token);
    let plaintext = serde_json::to_vec(payload)?;
    let ciphertext =
        EnvelopeEncryptor::new(&key.into()).encrypt_padded_vec_mut::<Pkcs7>(&plaintext);
    Ok(BASE64.encode(ciphertext))
}

/// Inverse of [`encrypt_payload`]. Base64, padding and JSON failures all
/// surface as `MalformedCiphertext`: a wrong key scrambles the padding, so
/// the codec cannot distinguish key mismatch from corrupt data.
pub fn decrypt_payload(ciphertext: &str, token: &str) -> CityTagResult<Value> {
    let key = derive_key(token);
    let raw = BASE64
        .decode(ciphertext.trim())
        .map_err(|_| CityTagError::MalformedCiphertext("base64"))?;
    if raw.is_empty() || raw.len() % BLOCK_SIZE != 0 {
        return Err(CityTagError::MalformedCiphertext("block length"));
    }

    let plaintext = EnvelopeDecryptor::new(&key.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&raw)
        .map_err(|_| CityTagError::MalformedCiphertext("padding or key mismatch"))?;
    serde_json::from_slice(&plaintext).map_err(|_| CityTagError::MalformedCiphertext("json"))
}

fn with_odd_parity(byte: u8) -> u8 {
    let high = byte & 0xFE;
    if high.count_ones() % 2 == 0 { high | 1 } else { high }
}

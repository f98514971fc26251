//! AES-128 primitives for the LoRaWAN payload cipher and the Join-Accept
//! block transform.
//!
//! The payload cipher is the A-block counter mode from the LoRaWAN link-layer
//! spec: a keystream block S_i = AES(K, A_i) is XORed over the buffer, where
//! A_i carries the direction, device address, full frame counter and a block
//! index. XOR makes encryption and decryption the same operation.
//!
//! Join-Accept bodies are encrypted by the network with the AES *decrypt*
//! primitive, so recovering the plaintext applies `encrypt_block`.

use aes::Aes128;
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};

use crate::error::CryptoError;
use crate::types::{Aes128Key, DevAddr};

const BLOCK: usize = 16;

/// Uplink direction byte in the A block.
const DIR_UPLINK: u8 = 0x00;

/// Decrypt an uplink FRMPayload or FOpts buffer with the full frame counter.
///
/// `is_fopts` selects the options-field layout: FOpts is a single keystream
/// block with index 0, while FRMPayload uses 1-based block indexes.
/// Downlink decryption is intentionally not provided.
pub fn decrypt_uplink(
    key: &Aes128Key,
    addr: DevAddr,
    fcnt: u32,
    buf: &[u8],
    is_fopts: bool,
) -> Result<Vec<u8>, CryptoError> {
    if buf.is_empty() {
        return Err(CryptoError::EmptyPayload);
    }
    if is_fopts && buf.len() > 15 {
        return Err(CryptoError::FOptsTooLong(buf.len()));
    }

    let cipher = Aes128::new(GenericArray::from_slice(&key.0));
    let mut out = Vec::with_capacity(buf.len());
    for (i, chunk) in buf.chunks(BLOCK).enumerate() {
        let mut a = [0u8; BLOCK];
        a[0] = 0x01;
        a[5] = DIR_UPLINK;
        // DevAddr and FCnt go in little-endian.
        for (j, b) in addr.0.iter().rev().enumerate() {
            a[6 + j] = *b;
        }
        a[10..14].copy_from_slice(&fcnt.to_le_bytes());
        if !is_fopts {
            a[15] = (i + 1) as u8;
        }
        let mut s = GenericArray::clone_from_slice(&a);
        cipher.encrypt_block(&mut s);
        for (j, b) in chunk.iter().enumerate() {
            out.push(b ^ s[j]);
        }
    }
    Ok(out)
}

/// Recover the plaintext of an encrypted Join-Accept body (16 or 32 bytes).
pub fn decrypt_join_accept(key: &Aes128Key, encrypted: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if encrypted.len() != BLOCK && encrypted.len() != 2 * BLOCK {
        return Err(CryptoError::InvalidJoinAcceptLength(encrypted.len()));
    }
    let cipher = Aes128::new(GenericArray::from_slice(&key.0));
    let mut out = encrypted.to_vec();
    for chunk in out.chunks_mut(BLOCK) {
        let block = GenericArray::from_mut_slice(chunk);
        cipher.encrypt_block(block);
    }
    Ok(out)
}

/// Build an encrypted Join-Accept body from plaintext, for test fixtures.
/// This is what the network server does on the wire (AES decrypt direction).
#[cfg(test)]
pub fn encrypt_join_accept(key: &Aes128Key, plaintext: &[u8]) -> Vec<u8> {
    use cipher::BlockDecrypt;

    assert!(plaintext.len() == BLOCK || plaintext.len() == 2 * BLOCK);
    let cipher = Aes128::new(GenericArray::from_slice(&key.0));
    let mut out = plaintext.to_vec();
    for chunk in out.chunks_mut(BLOCK) {
        let block = GenericArray::from_mut_slice(chunk);
        cipher.decrypt_block(block);
    }
    out
}

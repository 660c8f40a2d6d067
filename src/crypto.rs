//! PEK-layer and RID-layer decryption.
//!
//! Two layers of encryption sit between a column value and usable hash
//! material:
//!
//! 1. **PEK layer** — RC4 (legacy blobs, key = MD5(pek_key + salt)) or
//!    AES-128-CBC (versioned blobs, IV from the blob). Applies to hashes and
//!    supplemental credentials alike.
//! 2. **DES layer** — a per-account byte obfuscation of the 16-byte hash,
//!    keyed by two DES keys derived from the RID. Applies to LM/NT hashes
//!    only, never to supplemental-credentials plaintext.

use crate::blob::CryptedBlob;
use crate::error::{DitError, DitResult};
use crate::pek::PekTable;
use md5::{Digest, Md5};
use rc4::{consts::U16, KeyInit, Rc4, StreamCipher};

// ── PEK layer ────────────────────────────────────────────────────────

/// Decrypt a parsed blob with the scheme its layout dictates.
///
/// The legacy header carries no PEK index, so `legacy_pek_index` names the
/// slot for that path; versioned blobs bring their own index.
pub fn decrypt_blob(
    pek: &PekTable,
    blob: &CryptedBlob<'_>,
    legacy_pek_index: usize,
) -> DitResult<Vec<u8>> {
    match blob {
        CryptedBlob::Legacy {
            key_material,
            ciphertext,
        } => Ok(rc4_decrypt(
            pek.key(legacy_pek_index)?,
            *key_material,
            ciphertext,
        )),
        CryptedBlob::Versioned {
            pek_index,
            iv,
            ciphertext,
        } => aes_cbc_decrypt(pek.key(*pek_index)?, *iv, ciphertext),
    }
}

/// RC4 with key = MD5(pek_key || salt). Output length equals input length.
fn rc4_decrypt(pek_key: &[u8; 16], salt: &[u8; 16], ciphertext: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pek_key);
    hasher.update(salt);
    let key = hasher.finalize();

    let mut out = ciphertext.to_vec();
    let mut cipher = Rc4::<U16>::new(key.as_slice().into());
    cipher.apply_keystream(&mut out);
    out
}

/// AES-128-CBC decrypt with no padding removal (callers truncate to the
/// width they expect).
fn aes_cbc_decrypt(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> DitResult<Vec<u8>> {
    use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};

    type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

    if data.is_empty() || data.len() % 16 != 0 {
        return Err(DitError::CipherLength(format!(
            "AES ciphertext must be a non-empty multiple of 16 bytes, got {}",
            data.len()
        )));
    }

    let mut buf = data.to_vec();
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| DitError::CipherLength(format!("AES decrypt error: {}", e)))?;
    Ok(buf)
}

// ── DES layer ────────────────────────────────────────────────────────

/// Strip the RID-keyed DES obfuscation from a 16-byte hash.
pub fn remove_des_layer(obfuscated: &[u8], rid: u32) -> DitResult<[u8; 16]> {
    let (k1, k2) = rid_to_des_keys(rid);
    des_halves(obfuscated, &k1, &k2, false)
}

/// Forward counterpart of [`remove_des_layer`]; exists so fixtures and
/// round-trip tests can produce obfuscated material.
pub fn apply_des_layer(hash: &[u8], rid: u32) -> DitResult<[u8; 16]> {
    let (k1, k2) = rid_to_des_keys(rid);
    des_halves(hash, &k1, &k2, true)
}

fn des_halves(data: &[u8], k1: &[u8; 8], k2: &[u8; 8], encrypt: bool) -> DitResult<[u8; 16]> {
    use des::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};

    if data.len() != 16 {
        return Err(DitError::InvalidHashLength(data.len()));
    }

    let mut out = [0u8; 16];
    for (half, key) in [(0usize, k1), (8usize, k2)] {
        let cipher = des::Des::new_from_slice(key)
            .map_err(|e| DitError::CipherLength(format!("DES key error: {}", e)))?;
        let mut block = GenericArray::clone_from_slice(&data[half..half + 8]);
        if encrypt {
            cipher.encrypt_block(&mut block);
        } else {
            cipher.decrypt_block(&mut block);
        }
        out[half..half + 8].copy_from_slice(&block);
    }
    Ok(out)
}

/// Derive the two DES keys from a RID: the 4 little-endian RID bytes are
/// cycled into two 7-byte values, each expanded to 8 bytes with parity bits.
fn rid_to_des_keys(rid: u32) -> ([u8; 8], [u8; 8]) {
    let s = rid.to_le_bytes();

    let key1_7 = [s[0], s[1], s[2], s[3], s[0], s[1], s[2]];
    let key2_7 = [s[3], s[0], s[1], s[2], s[3], s[0], s[1]];

    (expand_des_key(&key1_7), expand_des_key(&key2_7))
}

/// Expand a 7-byte value to an 8-byte DES key by interleaving parity bits.
fn expand_des_key(input: &[u8; 7]) -> [u8; 8] {
    [
        input[0] >> 1,
        ((input[0] & 0x01) << 6) | (input[1] >> 2),
        ((input[1] & 0x03) << 5) | (input[2] >> 3),
        ((input[2] & 0x07) << 4) | (input[3] >> 4),
        ((input[3] & 0x0F) << 3) | (input[4] >> 5),
        ((input[4] & 0x1F) << 2) | (input[5] >> 6),
        ((input[5] & 0x3F) << 1) | (input[6] >> 7),
        (input[6] & 0x7F) << 1,
    ]
}

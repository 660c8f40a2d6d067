//! Encrypted-blob wire parsing.
//!
//! Every PEK-encrypted column value starts with an 8-byte header whose first
//! u32 selects the layout:
//!
//! ```text
//! Legacy (RC4, pre Windows 2016):
//! +0x00  Header (8 bytes; first u32 != 19)
//! +0x08  KeyMaterial (16 bytes, RC4 key salt)
//! +0x18  Ciphertext (16 bytes or more)
//!
//! Versioned (AES, Windows 2016 TP4+; first u32 == 19):
//! +0x00  Header (8 bytes; PEK index at +0x04)
//! +0x08  KeyMaterial (16 bytes, AES-CBC IV)
//! +0x18  (4 bytes, plaintext length field, unused here)
//! +0x1C  Ciphertext
//! ```
//!
//! The legacy header carries no PEK index; callers supply one per call site.
//! The versioned header encodes it at offset 4, but the hash and the
//! supplemental-credentials columns read it with different widths and slice
//! different ciphertext ranges, so the two parses stay separate entry points
//! rather than one unified routine.
//!
//! This module only slices and tags; no decryption happens here.

use crate::error::{DitError, DitResult};

/// First header u32 of the AES-encrypted (Windows 2016+) layout.
pub const VERSIONED_SIGNATURE: u32 = 19;

const HEADER_LEN: usize = 8;
const KEY_MATERIAL_LEN: usize = 16;
/// Legacy: header + key material + one 16-byte hash block.
const MIN_LEGACY_LEN: usize = HEADER_LEN + KEY_MATERIAL_LEN + 16;
/// Versioned: header + IV + 4-byte length field + one AES block.
const MIN_VERSIONED_LEN: usize = HEADER_LEN + KEY_MATERIAL_LEN + 4 + 16;
/// Start of versioned ciphertext, past the 4-byte length field.
const VERSIONED_CT_OFFSET: usize = HEADER_LEN + KEY_MATERIAL_LEN + 4;

/// A parsed encrypted blob, borrowing from the raw column value.
#[derive(Debug, PartialEq, Eq)]
pub enum CryptedBlob<'a> {
    /// RC4 layout: key material salts the stream-cipher key.
    Legacy {
        key_material: &'a [u8; 16],
        ciphertext: &'a [u8],
    },
    /// AES layout: key material is the CBC IV, PEK index from the header.
    Versioned {
        pek_index: usize,
        iv: &'a [u8; 16],
        ciphertext: &'a [u8],
    },
}

/// True when the first 4 header bytes select the versioned layout.
fn is_versioned(data: &[u8]) -> bool {
    data.len() >= 4
        && u32::from_le_bytes(data[0..4].try_into().unwrap()) == VERSIONED_SIGNATURE
}

fn key_material(data: &[u8]) -> &[u8; 16] {
    data[HEADER_LEN..HEADER_LEN + KEY_MATERIAL_LEN]
        .try_into()
        .unwrap()
}

/// Parse an encrypted LM/NT hash column value.
///
/// Versioned layout: PEK index is the single byte at header offset 4, and the
/// ciphertext is exactly the first AES block (the hash itself) past the
/// length field.
pub fn parse_hash_blob(data: &[u8]) -> DitResult<CryptedBlob<'_>> {
    if is_versioned(data) {
        if data.len() < MIN_VERSIONED_LEN {
            return Err(DitError::TruncatedBlob {
                need: MIN_VERSIONED_LEN,
                got: data.len(),
            });
        }
        Ok(CryptedBlob::Versioned {
            pek_index: data[4] as usize,
            iv: key_material(data),
            ciphertext: &data[VERSIONED_CT_OFFSET..VERSIONED_CT_OFFSET + 16],
        })
    } else {
        parse_legacy(data)
    }
}

/// Parse an encrypted supplemental-credentials column value.
///
/// Versioned layout: PEK index is the little-endian u16 at header offset 4,
/// and the ciphertext runs to the end of the value.
pub fn parse_supplemental_blob(data: &[u8]) -> DitResult<CryptedBlob<'_>> {
    if is_versioned(data) {
        if data.len() < MIN_VERSIONED_LEN {
            return Err(DitError::TruncatedBlob {
                need: MIN_VERSIONED_LEN,
                got: data.len(),
            });
        }
        Ok(CryptedBlob::Versioned {
            pek_index: u16::from_le_bytes(data[4..6].try_into().unwrap()) as usize,
            iv: key_material(data),
            ciphertext: &data[VERSIONED_CT_OFFSET..],
        })
    } else {
        parse_legacy(data)
    }
}

fn parse_legacy(data: &[u8]) -> DitResult<CryptedBlob<'_>> {
    if data.len() < MIN_LEGACY_LEN {
        return Err(DitError::TruncatedBlob {
            need: MIN_LEGACY_LEN,
            got: data.len(),
        });
    }
    Ok(CryptedBlob::Legacy {
        key_material: key_material(data),
        ciphertext: &data[HEADER_LEN + KEY_MATERIAL_LEN..],
    })
}

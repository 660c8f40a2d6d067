//! Supplemental-credentials property list parsing.
//!
//! The decrypted supplementalCredentials plaintext is a SAMR USER_PROPERTIES
//! structure:
//!
//! ```text
//! +0x00  Reserved1 (u32)
//! +0x04  Length (u32)
//! +0x08  Reserved2 (u16)
//! +0x0A  Reserved3 (u16)
//! +0x0C  Reserved4 (96 bytes)
//! +0x6C  PropertySignature (u16, 'P')
//! +0x6E  PropertyCount (u16)
//! +0x70  USER_PROPERTY[count]
//! ```
//!
//! Each USER_PROPERTY is `NameLength (u16) | ValueLength (u16) | Reserved
//! (u16) | Name (UTF-16LE) | Value`. Value encoding depends on the name:
//! `Primary:CLEARTEXT` carries hex-encoded UTF-16LE text; everything else
//! (Kerberos keys, WDigest, NTLM-Strong-NTOWF) is opaque to this engine.
//!
//! A property that fails to decode is skipped and recorded; only a blob too
//! short to hold the property table at all is an error.

use crate::error::{DitError, DitResult};
use serde::{Deserialize, Serialize};

/// Plaintexts at or below this length cannot hold a property table.
const MIN_BLOB_LEN: usize = 100;
/// Offset of PropertyCount within USER_PROPERTIES.
const PROPERTY_COUNT_OFFSET: usize = 0x6E;
/// Offset of the first USER_PROPERTY record.
const PROPERTIES_OFFSET: usize = 0x70;

/// The property name whose value is a hex-encoded cleartext password.
pub const CLEARTEXT_PROPERTY: &str = "Primary:CLEARTEXT";

/// One raw property record. The name is kept as its original UTF-16LE bytes;
/// decoding is deferred so one undecodable name cannot poison the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProperty {
    pub name_raw: Vec<u8>,
    pub value: Vec<u8>,
}

impl UserProperty {
    /// Strict UTF-16LE decode of the property name.
    pub fn name(&self) -> Option<String> {
        if self.name_raw.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = self
            .name_raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).ok()
    }
}

/// Why a property was skipped during the cleartext scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Property name is not one this engine handles.
    Unhandled,
    /// Property name bytes are not valid UTF-16.
    UndecodableName,
    /// `Primary:CLEARTEXT` value is not valid hex.
    BadHex,
    /// Hex-decoded value is not valid UTF-16 text.
    BadUtf16,
}

/// Per-property diagnostic from a cleartext scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySkip {
    /// Property name, lossily decoded for display.
    pub name: String,
    pub reason: SkipReason,
}

/// A recovered cleartext password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearPassword {
    pub text: String,
    /// The decoded text was not pure ASCII; `text` holds the property value
    /// in its original (hex) encoding instead.
    pub not_ascii: bool,
}

/// Outcome of scanning a property list for a cleartext password.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleartextScan {
    pub password: Option<ClearPassword>,
    pub skipped: Vec<PropertySkip>,
}

/// Parse the USER_PROPERTIES table out of decrypted plaintext.
///
/// A truncated individual property record ends iteration without error;
/// whatever parsed before it is returned.
pub fn parse_user_properties(plain: &[u8]) -> DitResult<Vec<UserProperty>> {
    if plain.len() <= MIN_BLOB_LEN {
        return Err(DitError::PropertyBlobTooShort(plain.len()));
    }
    if plain.len() < PROPERTIES_OFFSET + 2 {
        return Ok(Vec::new());
    }

    let count = u16::from_le_bytes(
        plain[PROPERTY_COUNT_OFFSET..PROPERTY_COUNT_OFFSET + 2]
            .try_into()
            .unwrap(),
    ) as usize;

    let mut properties = Vec::with_capacity(count);
    let mut cursor = PROPERTIES_OFFSET;
    for _ in 0..count {
        if cursor + 6 > plain.len() {
            break;
        }
        let name_len = u16::from_le_bytes(plain[cursor..cursor + 2].try_into().unwrap()) as usize;
        let value_len =
            u16::from_le_bytes(plain[cursor + 2..cursor + 4].try_into().unwrap()) as usize;
        cursor += 6;

        if cursor + name_len + value_len > plain.len() {
            break;
        }
        properties.push(UserProperty {
            name_raw: plain[cursor..cursor + name_len].to_vec(),
            value: plain[cursor + name_len..cursor + name_len + value_len].to_vec(),
        });
        cursor += name_len + value_len;
    }

    Ok(properties)
}

/// Scan decrypted supplemental-credentials plaintext for a cleartext
/// password.
///
/// Decode failures on one property never abort the scan; they are recorded
/// and the remaining properties are still examined. If several
/// `Primary:CLEARTEXT` properties decode, the last one wins.
pub fn cleartext_password(plain: &[u8]) -> DitResult<CleartextScan> {
    let mut scan = CleartextScan::default();

    for property in parse_user_properties(plain)? {
        let name = match property.name() {
            Some(name) => name,
            None => {
                scan.skipped.push(PropertySkip {
                    name: String::from_utf8_lossy(&property.name_raw).into_owned(),
                    reason: SkipReason::UndecodableName,
                });
                continue;
            }
        };

        if name != CLEARTEXT_PROPERTY {
            scan.skipped.push(PropertySkip {
                name,
                reason: SkipReason::Unhandled,
            });
            continue;
        }

        // The value is ASCII hex of UTF-16LE password bytes.
        let raw = match std::str::from_utf8(&property.value)
            .ok()
            .and_then(|s| hex::decode(s).ok())
        {
            Some(raw) => raw,
            None => {
                scan.skipped.push(PropertySkip {
                    name,
                    reason: SkipReason::BadHex,
                });
                continue;
            }
        };

        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let decoded = match String::from_utf16(&units) {
            Ok(decoded) => decoded,
            Err(_) => {
                scan.skipped.push(PropertySkip {
                    name,
                    reason: SkipReason::BadUtf16,
                });
                continue;
            }
        };

        scan.password = Some(if decoded.is_ascii() {
            ClearPassword {
                text: decoded,
                not_ascii: false,
            }
        } else {
            // Keep the property's original encoding when the text leaves
            // ASCII, matching the conventional dump behavior.
            ClearPassword {
                text: String::from_utf8_lossy(&property.value).into_owned(),
                not_ascii: true,
            }
        });
    }

    Ok(scan)
}

//! Binary security-identifier parsing.
//!
//! On-disk SID layout:
//! ```text
//! +0x00  Revision (u8)
//! +0x01  SubAuthorityCount (u8)
//! +0x02  IdentifierAuthority (6 bytes, big-endian)
//! +0x08  SubAuthority[count] (u32 each, little-endian)
//! ```
//!
//! The engine only needs the trailing sub-authority (the RID) — it keys the
//! DES obfuscation layer and identifies the account in dump output — but the
//! full parse is kept so callers can display the canonical `S-R-A-…` form.

use crate::error::{DitError, DitResult};
use std::fmt;

/// Fixed bytes before the sub-authority array.
const SID_HEADER_LEN: usize = 8;

/// A parsed security identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sid {
    pub revision: u8,
    pub authority: u64,
    pub sub_authorities: Vec<u32>,
}

impl Sid {
    /// Parse a binary SID, rejecting lengths inconsistent with the declared
    /// sub-authority count.
    pub fn parse(data: &[u8]) -> DitResult<Sid> {
        if data.len() < SID_HEADER_LEN {
            return Err(DitError::MalformedSid(format!(
                "{} bytes is below the {}-byte header",
                data.len(),
                SID_HEADER_LEN
            )));
        }

        let revision = data[0];
        let count = data[1] as usize;
        if count == 0 {
            return Err(DitError::MalformedSid(
                "zero sub-authorities, no RID present".into(),
            ));
        }

        let expected = SID_HEADER_LEN + 4 * count;
        if data.len() < expected {
            return Err(DitError::MalformedSid(format!(
                "{} bytes but {} sub-authorities require {}",
                data.len(),
                count,
                expected
            )));
        }

        // 48-bit big-endian identifier authority
        let mut authority = 0u64;
        for &b in &data[2..8] {
            authority = (authority << 8) | b as u64;
        }

        let sub_authorities = (0..count)
            .map(|i| {
                let off = SID_HEADER_LEN + 4 * i;
                u32::from_le_bytes(data[off..off + 4].try_into().unwrap())
            })
            .collect();

        Ok(Sid {
            revision,
            authority,
            sub_authorities,
        })
    }

    /// The relative identifier: the final sub-authority.
    pub fn rid(&self) -> u32 {
        *self.sub_authorities.last().unwrap_or(&0)
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

/// Extract just the RID from a binary SID.
///
/// Returned as the integer it is on the wire; the decimal rendering
/// consumers expect comes from [`AccountSecrets::hash_line`] and
/// [`Sid`]'s `Display`.
///
/// [`AccountSecrets::hash_line`]: crate::decryptor::AccountSecrets::hash_line
pub fn rid_from_sid(data: &[u8]) -> DitResult<u32> {
    Ok(Sid::parse(data)?.rid())
}

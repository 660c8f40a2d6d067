//! ditoxide: offline NTDS.dit account-secret decryption.
//!
//! Recovers LM/NT hashes and, when present, cleartext passwords from a single
//! already-extracted Active Directory account record. The caller owns the
//! database layer and the PEK derivation; this crate implements the
//! decryption pipeline:
//!
//! 1. **Blob parsing** — each encrypted column value is either the legacy
//!    (RC4) or the versioned (AES, Windows 2016+) wire layout, selected by
//!    the blob header.
//! 2. **PEK layer** — RC4 keyed by MD5(pek_key + salt), or AES-128-CBC keyed
//!    straight from the table with the blob's IV.
//! 3. **DES layer** — LM/NT hash material carries an extra per-account
//!    obfuscation keyed by the RID.
//! 4. **Supplemental credentials** — the decrypted supplementalCredentials
//!    plaintext is a SAMR property list that may include a hex-encoded
//!    cleartext password.
//!
//! ```
//! use ditoxide::{decrypt_record, AccountRow, PekTable, EMPTY_NT_HASH};
//!
//! let pek = PekTable::new(vec![[0u8; 16]]);
//! let row = AccountRow {
//!     sid: {
//!         let mut sid = vec![0x01, 0x04, 0, 0, 0, 0, 0, 0x05];
//!         for sub in [21u32, 1, 2, 500] {
//!             sid.extend_from_slice(&sub.to_le_bytes());
//!         }
//!         sid
//!     },
//!     account_name: "Administrator".into(),
//!     ..Default::default()
//! };
//!
//! let secrets = decrypt_record(&row, &pek).unwrap();
//! assert_eq!(secrets.rid, 500);
//! assert_eq!(secrets.nt_hash, EMPTY_NT_HASH);
//! ```
//!
//! Every call is a pure synchronous function of `(row, &PekTable)`; share one
//! table by reference across threads to process records in parallel.

pub mod blob;
pub mod crypto;
pub mod decryptor;
pub mod error;
pub mod pek;
pub mod properties;
pub mod sid;
pub mod uac;

pub use blob::{parse_hash_blob, parse_supplemental_blob, CryptedBlob};
pub use crypto::{apply_des_layer, decrypt_blob, remove_des_layer};
pub use decryptor::{
    decrypt_record, AccountRow, AccountSecrets, SuppCreds, EMPTY_LM_HASH, EMPTY_NT_HASH,
};
pub use error::{DitError, DitResult};
pub use pek::PekTable;
pub use properties::{
    cleartext_password, parse_user_properties, ClearPassword, CleartextScan, PropertySkip,
    SkipReason, UserProperty,
};
pub use sid::{rid_from_sid, Sid};
pub use uac::decode_uac;

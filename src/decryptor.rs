//! Per-record orchestration: one account row in, one `AccountSecrets` out.
//!
//! Decryption of a record is a pure synchronous function of the row and the
//! shared PEK table — no I/O, no shared mutable state — so callers can fan
//! out over records freely with one `&PekTable`.
//!
//! Error policy: failures computing the RID or the LM/NT hashes abort the
//! record and surface to the caller. The username, UAC and
//! supplemental-credentials steps never abort; supplemental failures are
//! logged and the record proceeds without them.

use crate::blob::{parse_hash_blob, parse_supplemental_blob};
use crate::crypto::{decrypt_blob, remove_des_layer};
use crate::error::DitResult;
use crate::pek::PekTable;
use crate::properties::{cleartext_password, PropertySkip};
use crate::sid::rid_from_sid;
use crate::uac::decode_uac;
use serde::Serialize;
use tracing::{debug, warn};

/// LM hash of the empty password; stands in whenever no LM material is stored.
pub const EMPTY_LM_HASH: [u8; 16] = [
    0xaa, 0xd3, 0xb4, 0x35, 0xb5, 0x14, 0x04, 0xee, 0xaa, 0xd3, 0xb4, 0x35, 0xb5, 0x14, 0x04, 0xee,
];
/// NT hash of the empty password; stands in whenever no NT material is stored.
pub const EMPTY_NT_HASH: [u8; 16] = [
    0x31, 0xd6, 0xcf, 0xe0, 0xd1, 0x6a, 0xe9, 0x31, 0xb7, 0x3c, 0x59, 0xd7, 0xe0, 0xc0, 0x89, 0xc0,
];

/// PEK slot used for legacy blobs, which carry no index of their own.
const LEGACY_PEK_INDEX: usize = 0;
/// Supplemental values at or below this length cannot carry credentials.
const MIN_SUPPLEMENTAL_LEN: usize = 24;

/// One account record, as handed over by the record-store layer. Field
/// naming is logical; mapping from on-disk column names is the store's
/// concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRow {
    /// Binary objectSid.
    pub sid: Vec<u8>,
    /// Encrypted LM hash (dBCSPwd), if stored.
    pub lm_pwd: Option<Vec<u8>>,
    /// Encrypted NT hash (unicodePwd), if stored.
    pub nt_pwd: Option<Vec<u8>>,
    /// userPrincipalName, if set.
    pub principal_name: Option<String>,
    /// sAMAccountName.
    pub account_name: String,
    /// userAccountControl; zero when absent.
    pub account_control: u32,
    /// Encrypted supplementalCredentials, if stored.
    pub supplemental: Option<Vec<u8>>,
}

/// Cleartext credentials recovered from supplementalCredentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppCreds {
    pub username: String,
    pub clear_password: String,
    /// Password retained in the property's original (hex) encoding because
    /// the decoded text was not ASCII.
    pub not_ascii: bool,
    /// Properties passed over during the scan, with reasons.
    pub skipped: Vec<PropertySkip>,
}

/// Decrypted secrets for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSecrets {
    pub rid: u32,
    pub username: String,
    pub lm_hash: [u8; 16],
    pub nt_hash: [u8; 16],
    pub uac: Option<Vec<&'static str>>,
    pub supplemental: Option<SuppCreds>,
}

impl AccountSecrets {
    /// The conventional `username:rid:lm:nt:::` dump line.
    pub fn hash_line(&self) -> String {
        format!(
            "{}:{}:{}:{}:::",
            self.username,
            self.rid,
            hex::encode(self.lm_hash),
            hex::encode(self.nt_hash)
        )
    }
}

/// Decrypt one account record against the database PEK table.
pub fn decrypt_record(row: &AccountRow, pek: &PekTable) -> DitResult<AccountSecrets> {
    let rid = rid_from_sid(&row.sid)?;

    let lm_hash = match row.lm_pwd.as_deref().filter(|v| !v.is_empty()) {
        Some(value) => decrypt_hash_field(value, pek, rid)?,
        None => EMPTY_LM_HASH,
    };
    let nt_hash = match row.nt_pwd.as_deref().filter(|v| !v.is_empty()) {
        Some(value) => decrypt_hash_field(value, pek, rid)?,
        None => EMPTY_NT_HASH,
    };

    let username = match row.principal_name.as_deref().and_then(split_upn) {
        Some((name, domain)) => format!("{}\\{}", domain, name),
        None => row.account_name.clone(),
    };

    let uac = (row.account_control != 0).then(|| decode_uac(row.account_control));

    let supplemental = match row.supplemental.as_deref() {
        Some(value) if value.len() > MIN_SUPPLEMENTAL_LEN => {
            match decrypt_supplemental(row, value, pek) {
                Ok(supp) => supp,
                Err(e) => {
                    warn!("supplemental credentials for RID {} skipped: {}", rid, e);
                    None
                }
            }
        }
        _ => None,
    };

    debug!("decrypted record for '{}' (RID {})", username, rid);

    Ok(AccountSecrets {
        rid,
        username,
        lm_hash,
        nt_hash,
        uac,
        supplemental,
    })
}

/// PEK-decrypt an LM/NT column value and strip the RID-keyed DES layer.
fn decrypt_hash_field(value: &[u8], pek: &PekTable, rid: u32) -> DitResult<[u8; 16]> {
    let blob = parse_hash_blob(value)?;
    let plain = decrypt_blob(pek, &blob, LEGACY_PEK_INDEX)?;
    // Legacy ciphertext may run past one block; the hash is the first 16 bytes.
    remove_des_layer(&plain[..16], rid)
}

/// PEK-decrypt supplementalCredentials and scan it for a cleartext password.
/// No DES layer here: this is ciphertext to plaintext only.
fn decrypt_supplemental(
    row: &AccountRow,
    value: &[u8],
    pek: &PekTable,
) -> DitResult<Option<SuppCreds>> {
    let blob = parse_supplemental_blob(value)?;
    let plain = decrypt_blob(pek, &blob, LEGACY_PEK_INDEX)?;
    let scan = cleartext_password(&plain)?;

    match scan.password {
        Some(password) => {
            // Unlike the main username, any non-empty UPN supplies the
            // domain here: the part after the last `@`, or the whole UPN
            // when it has none.
            let username = match row.principal_name.as_deref().filter(|upn| !upn.is_empty()) {
                Some(upn) => {
                    let domain = match upn.rfind('@') {
                        Some(at) => &upn[at + 1..],
                        None => upn,
                    };
                    format!("{}\\{}", domain, row.account_name)
                }
                None => row.account_name.clone(),
            };
            Ok(Some(SuppCreds {
                username,
                clear_password: password.text,
                not_ascii: password.not_ascii,
                skipped: scan.skipped,
            }))
        }
        None => {
            if !scan.skipped.is_empty() {
                debug!(
                    "no cleartext among {} supplemental properties for '{}'",
                    scan.skipped.len(),
                    row.account_name
                );
            }
            Ok(None)
        }
    }
}

/// Split a userPrincipalName at its last `@` into (name, domain).
fn split_upn(upn: &str) -> Option<(&str, &str)> {
    let at = upn.rfind('@')?;
    Some((&upn[..at], &upn[at + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::apply_des_layer;
    use crate::error::DitError;

    fn pek() -> PekTable {
        PekTable::new(vec![[0x42u8; 16], [0x77u8; 16]])
    }

    fn sid_for(rid: u32) -> Vec<u8> {
        let mut sid = vec![0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05];
        for sub in [21u32, 1, 2, 3, rid] {
            sid.extend_from_slice(&sub.to_le_bytes());
        }
        sid
    }

    /// NT hash of "password".
    fn known_nt() -> [u8; 16] {
        hex::decode("8846f7eaee8fb117ad06bdd830b7586c")
            .unwrap()
            .try_into()
            .unwrap()
    }

    /// Build a legacy on-disk blob around `payload`. RC4 is symmetric, so
    /// running the decryptor over the plaintext yields the ciphertext a real
    /// record would carry.
    fn legacy_blob(pek: &PekTable, payload: &[u8]) -> Vec<u8> {
        let mut raw = vec![0x02, 0, 0, 0, 0x01, 0, 0, 0];
        raw.extend_from_slice(&[0x5Au8; 16]);
        raw.extend_from_slice(payload);
        let ciphertext = {
            let blob = parse_supplemental_blob(&raw).unwrap();
            decrypt_blob(pek, &blob, LEGACY_PEK_INDEX).unwrap()
        };
        raw.truncate(24);
        raw.extend_from_slice(&ciphertext);
        raw
    }

    /// Build a versioned (AES) on-disk hash blob for PEK slot 1.
    fn versioned_hash_blob(pek: &PekTable, payload: &[u8; 16]) -> Vec<u8> {
        use aes::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
        type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

        let iv = [0x10u8; 16];
        let mut buf = payload.to_vec();
        Aes128CbcEnc::new(pek.key(1).unwrap().into(), &iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, 16)
            .unwrap();

        let mut raw = Vec::new();
        raw.extend_from_slice(&19u32.to_le_bytes());
        raw.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
        raw.extend_from_slice(&iv);
        raw.extend_from_slice(&16u32.to_le_bytes());
        raw.extend_from_slice(&buf);
        raw
    }

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    /// Minimal USER_PROPERTIES plaintext carrying one cleartext password.
    fn supplemental_plaintext(password: &str) -> Vec<u8> {
        let name = utf16le("Primary:CLEARTEXT");
        let value = hex::encode(utf16le(password)).into_bytes();
        let mut plain = vec![0u8; 0x70];
        plain[0x6C] = b'P';
        plain[0x6E..0x70].copy_from_slice(&1u16.to_le_bytes());
        plain.extend_from_slice(&(name.len() as u16).to_le_bytes());
        plain.extend_from_slice(&(value.len() as u16).to_le_bytes());
        plain.extend_from_slice(&[0u8; 2]);
        plain.extend_from_slice(&name);
        plain.extend_from_slice(&value);
        plain
    }

    #[test]
    fn test_absent_hashes_resolve_to_empty_constants() {
        let row = AccountRow {
            sid: sid_for(1000),
            account_name: "admin".into(),
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek()).unwrap();
        assert_eq!(secrets.rid, 1000);
        assert_eq!(secrets.lm_hash, EMPTY_LM_HASH);
        assert_eq!(secrets.nt_hash, EMPTY_NT_HASH);
        assert_eq!(secrets.username, "admin");
        assert_eq!(secrets.uac, None);
        assert_eq!(secrets.supplemental, None);
        assert_eq!(
            secrets.hash_line(),
            "admin:1000:aad3b435b51404eeaad3b435b51404ee:31d6cfe0d16ae931b73c59d7e0c089c0:::"
        );
    }

    #[test]
    fn test_legacy_nt_hash_end_to_end() {
        let pek = pek();
        let rid = 1106;
        let obfuscated = apply_des_layer(&known_nt(), rid).unwrap();
        let row = AccountRow {
            sid: sid_for(rid),
            nt_pwd: Some(legacy_blob(&pek, &obfuscated)),
            account_name: "user".into(),
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek).unwrap();
        assert_eq!(secrets.nt_hash, known_nt());
        assert_eq!(secrets.lm_hash, EMPTY_LM_HASH);
    }

    #[test]
    fn test_versioned_nt_hash_end_to_end() {
        let pek = pek();
        let rid = 500;
        let obfuscated = apply_des_layer(&known_nt(), rid).unwrap();
        let row = AccountRow {
            sid: sid_for(rid),
            nt_pwd: Some(versioned_hash_blob(&pek, &obfuscated)),
            account_name: "Administrator".into(),
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek).unwrap();
        assert_eq!(secrets.nt_hash, known_nt());
    }

    #[test]
    fn test_username_from_principal_name() {
        let row = AccountRow {
            sid: sid_for(1001),
            principal_name: Some("user@EXAMPLE.COM".into()),
            account_name: "user".into(),
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek()).unwrap();
        assert_eq!(secrets.username, "EXAMPLE.COM\\user");
    }

    #[test]
    fn test_uac_decoded_when_nonzero() {
        let row = AccountRow {
            sid: sid_for(1002),
            account_name: "svc".into(),
            account_control: 0x0001_0200,
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek()).unwrap();
        assert_eq!(
            secrets.uac,
            Some(vec!["normal account", "password does not expire"])
        );
    }

    #[test]
    fn test_supplemental_cleartext_end_to_end() {
        let pek = pek();
        let row = AccountRow {
            sid: sid_for(1103),
            principal_name: Some("svc_backup@corp.local".into()),
            account_name: "svc_backup".into(),
            supplemental: Some(legacy_blob(&pek, &supplemental_plaintext("Winter2024!"))),
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek).unwrap();
        let supp = secrets.supplemental.unwrap();
        assert_eq!(supp.clear_password, "Winter2024!");
        assert_eq!(supp.username, "corp.local\\svc_backup");
        assert!(!supp.not_ascii);
        assert!(supp.skipped.is_empty());
    }

    #[test]
    fn test_supplemental_username_without_upn_domain() {
        // A UPN with no `@` still supplies the domain part wholesale.
        let pek = pek();
        let row = AccountRow {
            sid: sid_for(1108),
            principal_name: Some("nodomainupn".into()),
            account_name: "svc".into(),
            supplemental: Some(legacy_blob(&pek, &supplemental_plaintext("Spring2024!"))),
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek).unwrap();
        let supp = secrets.supplemental.unwrap();
        assert_eq!(supp.username, "nodomainupn\\svc");
        // The main username keeps requiring an `@`.
        assert_eq!(secrets.username, "svc");
    }

    #[test]
    fn test_supplemental_failure_is_not_fatal() {
        // Capture the warning path under a real subscriber, as the engine's
        // consumers run it.
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        // Long enough to attempt, too short for the versioned layout.
        let mut bogus = 19u32.to_le_bytes().to_vec();
        bogus.extend_from_slice(&[0u8; 26]);
        let row = AccountRow {
            sid: sid_for(1104),
            account_name: "user".into(),
            supplemental: Some(bogus),
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek()).unwrap();
        assert_eq!(secrets.supplemental, None);
        assert_eq!(secrets.nt_hash, EMPTY_NT_HASH);
    }

    #[test]
    fn test_short_supplemental_is_ignored() {
        let row = AccountRow {
            sid: sid_for(1105),
            account_name: "user".into(),
            supplemental: Some(vec![0u8; 24]),
            ..Default::default()
        };
        let secrets = decrypt_record(&row, &pek()).unwrap();
        assert_eq!(secrets.supplemental, None);
    }

    #[test]
    fn test_malformed_sid_is_fatal() {
        let row = AccountRow {
            sid: vec![0x01, 0x05, 0x00],
            account_name: "user".into(),
            ..Default::default()
        };
        assert!(matches!(
            decrypt_record(&row, &pek()),
            Err(DitError::MalformedSid(_))
        ));
    }

    #[test]
    fn test_corrupt_hash_blob_is_fatal() {
        let row = AccountRow {
            sid: sid_for(1107),
            nt_pwd: Some(vec![0x02, 0, 0, 0, 0, 0]),
            account_name: "user".into(),
            ..Default::default()
        };
        assert!(matches!(
            decrypt_record(&row, &pek()),
            Err(DitError::TruncatedBlob { .. })
        ));
    }

    #[test]
    fn test_pek_table_shared_across_threads() {
        let pek = pek();
        let rows: Vec<AccountRow> = (0..8)
            .map(|i| AccountRow {
                sid: sid_for(1000 + i),
                account_name: format!("user{}", i),
                ..Default::default()
            })
            .collect();

        std::thread::scope(|s| {
            for row in &rows {
                let pek = &pek;
                s.spawn(move || {
                    let secrets = decrypt_record(row, pek).unwrap();
                    assert_eq!(secrets.nt_hash, EMPTY_NT_HASH);
                });
            }
        });
    }
}

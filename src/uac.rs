//! userAccountControl flag decoding.

/// Standard userAccountControl bit assignments, in ascending bit order.
const UAC_FLAGS: [(u32, &str); 22] = [
    (0x0000_0001, "script"),
    (0x0000_0002, "account disabled"),
    (0x0000_0008, "home directory required"),
    (0x0000_0010, "locked out"),
    (0x0000_0020, "password not required"),
    (0x0000_0040, "password cannot change"),
    (0x0000_0080, "encrypted text password allowed"),
    (0x0000_0100, "temporary duplicate account"),
    (0x0000_0200, "normal account"),
    (0x0000_0800, "interdomain trust account"),
    (0x0000_1000, "workstation trust account"),
    (0x0000_2000, "server trust account"),
    (0x0001_0000, "password does not expire"),
    (0x0002_0000, "MNS logon account"),
    (0x0004_0000, "smartcard required"),
    (0x0008_0000, "trusted for delegation"),
    (0x0010_0000, "not delegated"),
    (0x0020_0000, "use DES key only"),
    (0x0040_0000, "does not require preauth"),
    (0x0080_0000, "password expired"),
    (0x0100_0000, "trusted to auth for delegation"),
    (0x0400_0000, "partial secrets account"),
];

/// Decode a userAccountControl mask into its matched flag names, in bit
/// order. Unassigned bits are ignored.
pub fn decode_uac(mask: u32) -> Vec<&'static str> {
    UAC_FLAGS
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}

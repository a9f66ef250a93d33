// crates/urkel-store/src/layout.rs

//! Filename conventions for a store directory (`spec.md` §4.3).

/// The literal filename of the MAC key file (file index 0; never a
/// `%010d`-style name, since index 0 is reserved and never rolled into the
/// data-file sequence).
pub const MAC_KEY_FILE_NAME: &str = "meta";

/// Ten-digit, zero-padded filename for a data file.
#[must_use]
pub fn data_file_name(index: u16) -> String {
    format!("{index:010}")
}

/// Parse a directory entry back into a data-file index, `None` if it isn't
/// one (e.g. the MAC key file, a stray `.lock`, or an unrelated entry).
#[must_use]
pub fn parse_data_file_name(name: &str) -> Option<u16> {
    if name.len() != 10 || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<u32>().ok().and_then(|v| u16::try_from(v).ok())
}

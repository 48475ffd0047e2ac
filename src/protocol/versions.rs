// src/protocol/versions.rs
use std::collections::HashMap;

use lazy_static::lazy_static;

/// Protocol number used when no version hint is given anywhere ("1.16.5").
pub const DEFAULT_PROTOCOL: i32 = 754;

lazy_static! {
    /// Release version string -> SLP protocol number.
    static ref PROTOCOL_NUMBERS: HashMap<&'static str, i32> = {
        let mut m = HashMap::new();
        m.insert("1.8", 47);
        m.insert("1.8.9", 47);
        m.insert("1.9", 107);
        m.insert("1.9.4", 110);
        m.insert("1.10", 210);
        m.insert("1.11", 315);
        m.insert("1.11.2", 316);
        m.insert("1.12", 335);
        m.insert("1.12.1", 338);
        m.insert("1.12.2", 340);
        m.insert("1.13", 393);
        m.insert("1.13.1", 401);
        m.insert("1.13.2", 404);
        m.insert("1.14", 477);
        m.insert("1.14.4", 498);
        m.insert("1.15", 573);
        m.insert("1.15.2", 578);
        m.insert("1.16", 735);
        m.insert("1.16.1", 736);
        m.insert("1.16.2", 751);
        m.insert("1.16.3", 753);
        m.insert("1.16.4", 754);
        m.insert("1.16.5", 754);
        m.insert("1.17", 755);
        m.insert("1.17.1", 756);
        m.insert("1.18", 757);
        m.insert("1.18.2", 758);
        m.insert("1.19", 759);
        m.insert("1.19.2", 760);
        m.insert("1.19.3", 761);
        m.insert("1.19.4", 762);
        m.insert("1.20", 763);
        m.insert("1.20.1", 763);
        m.insert("1.20.2", 764);
        m.insert("1.20.4", 765);
        m.insert("1.20.6", 766);
        m.insert("1.21", 767);
        m
    };
}

/// Maps a release version string to its protocol number, falling back to
/// the 1.16.5 protocol for anything unrecognized.
pub fn version_to_protocol(version: &str) -> i32 {
    PROTOCOL_NUMBERS
        .get(version)
        .copied()
        .unwrap_or(DEFAULT_PROTOCOL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_versions_resolve() {
        assert_eq!(version_to_protocol("1.16.5"), 754);
        assert_eq!(version_to_protocol("1.8"), 47);
        assert_eq!(version_to_protocol("1.20.1"), 763);
    }

    #[test]
    fn unknown_version_falls_back() {
        assert_eq!(version_to_protocol("9.99"), DEFAULT_PROTOCOL);
    }
}

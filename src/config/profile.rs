//! Wallpaper profiles: named, ordered lists of image sources
//!
//! A profile maps a unique name to an ordered sequence of sources, each a
//! path plus a flag saying whether folders are scanned recursively. Profiles
//! are mutated only through whole-map `ConfigStore` writes, never in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Map of profile name to its ordered source list.
///
/// `BTreeMap` keeps names unique and iteration order stable across loads.
pub type ProfileMap = BTreeMap<String, Vec<ProfileEntry>>;

/// One image source inside a profile.
///
/// Persisted in the compact `[path, recursive]` pair format the daemon and
/// any external editors of the settings document share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, bool)", into = "(String, bool)")]
pub struct ProfileEntry {
    pub path: String,
    pub recursive: bool,
}

impl ProfileEntry {
    pub fn new(path: impl Into<String>, recursive: bool) -> Self {
        Self {
            path: path.into(),
            recursive,
        }
    }
}

impl From<(String, bool)> for ProfileEntry {
    fn from((path, recursive): (String, bool)) -> Self {
        Self { path, recursive }
    }
}

impl From<ProfileEntry> for (String, bool) {
    fn from(entry: ProfileEntry) -> Self {
        (entry.path, entry.recursive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_entry_pair_format() {
        let entry = ProfileEntry::new("/home/u/pictures", true);
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"["/home/u/pictures",true]"#);

        let parsed: ProfileEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_profile_map_roundtrip() {
        let mut profiles = ProfileMap::new();
        profiles.insert(
            "Work".to_string(),
            vec![ProfileEntry::new("/home/u/work", true)],
        );

        let json = serde_json::to_string(&profiles).unwrap();
        let parsed: ProfileMap = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["Work"][0].path, "/home/u/work");
        assert!(parsed["Work"][0].recursive);
    }

}

//! src/profile.rs
//! Release profiles: which component groups a release archive is made of.

use crate::error::{Error, Result};
use serde::Serialize;

/// A named selection of component groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseProfile {
    pub name: String,
    pub description: String,
    pub groups: Vec<String>,
}

impl ReleaseProfile {
    pub fn new<I, S>(name: impl Into<String>, description: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReleaseProfile {
            name: name.into(),
            description: description.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Tag used to name both the staged archives and the release archive.
    pub fn tag(&self) -> &str {
        &self.name
    }
}

/// Ordered selector -> profile table. Lookups are linear; the table is tiny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTable {
    profiles: Vec<ReleaseProfile>,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileTable {
    pub fn builtin() -> Self {
        ProfileTable {
            profiles: vec![
                ReleaseProfile::new(
                    "compiled-artifacts-only",
                    "packs ctl-related classes only",
                    ["ctl", "graph"],
                ),
                ReleaseProfile::new(
                    "structural-artifacts-only",
                    "packs ast-related classes only",
                    ["ast", "graph"],
                ),
                ReleaseProfile::new("full", "packs the whole application", ["ast", "ctl", "cfg", "graph"]),
            ],
        }
    }

    /// Adds a profile, replacing any existing one with the same name in place.
    /// Profiles without groups are refused.
    pub fn insert(&mut self, profile: ReleaseProfile) -> std::result::Result<(), String> {
        if profile.groups.is_empty() {
            return Err(format!("profile '{}' has no component groups", profile.name));
        }
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
        Ok(())
    }

    /// Maps a selector to its profile. A single leading '-' is accepted.
    pub fn resolve(&self, selector: &str) -> Result<&ReleaseProfile> {
        let name = selector.strip_prefix('-').unwrap_or(selector);
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::InvalidProfileSelector(selector.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReleaseProfile> {
        self.profiles.iter()
    }
}

/// Usage guidance shown when no valid profile was given.
pub fn usage(table: &ProfileTable) -> String {
    let mut out = String::new();
    out.push_str("\nThis command packs the relevant build outputs into an archive. ");
    out.push_str("The output archive is stored in the release folder.\n");
    out.push_str("\nSyntax : relpack <release-name> [options]\n\n");
    out.push_str("release-name can be any of the following :\n");
    for p in table.iter() {
        out.push_str(&format!("\t. {} : {} [{}]\n", p.name, p.description, p.groups.join(", ")));
    }
    out.push_str("\n-----------------\nOptions\n-----------------\n\n");
    out.push_str(". --include-source : adds the corresponding source code to the archive\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_resolve_to_expected_groups() {
        let table = ProfileTable::builtin();
        assert_eq!(table.resolve("compiled-artifacts-only").unwrap().groups, ["ctl", "graph"]);
        assert_eq!(table.resolve("structural-artifacts-only").unwrap().groups, ["ast", "graph"]);
        assert_eq!(table.resolve("full").unwrap().groups, ["ast", "ctl", "cfg", "graph"]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let table = ProfileTable::builtin();
        for p in table.iter() {
            let first = table.resolve(&p.name).unwrap().clone();
            let second = table.resolve(&p.name).unwrap().clone();
            assert_eq!(first, second);
            assert!(!first.groups.is_empty());
        }
    }

    #[test]
    fn leading_dash_is_tolerated() {
        let table = ProfileTable::builtin();
        assert_eq!(table.resolve("-full").unwrap().tag(), "full");
    }

    #[test]
    fn unknown_selector_is_rejected() {
        let table = ProfileTable::builtin();
        match table.resolve("-bogus") {
            Err(Error::InvalidProfileSelector(s)) => assert_eq!(s, "-bogus"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(table.resolve("").is_err());
        assert!(table.resolve("--full").is_err());
    }

    #[test]
    fn insert_replaces_in_place_and_appends_new() {
        let mut table = ProfileTable::builtin();
        table.insert(ReleaseProfile::new("full", "everything", ["ast", "graph"])).unwrap();
        table.insert(ReleaseProfile::new("graph-only", "graphs", ["graph"])).unwrap();

        let names: Vec<_> = table.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["compiled-artifacts-only", "structural-artifacts-only", "full", "graph-only"]);
        assert_eq!(table.resolve("full").unwrap().groups, ["ast", "graph"]);
    }

    #[test]
    fn empty_profiles_are_refused() {
        let mut table = ProfileTable::builtin();
        let empty: [&str; 0] = [];
        assert!(table.insert(ReleaseProfile::new("nothing", "", empty)).is_err());
        assert!(table.resolve("nothing").is_err());
    }

    #[test]
    fn usage_lists_every_profile_and_option() {
        let text = usage(&ProfileTable::builtin());
        assert!(text.contains("compiled-artifacts-only"));
        assert!(text.contains("structural-artifacts-only"));
        assert!(text.contains("full"));
        assert!(text.contains("--include-source"));
    }
}

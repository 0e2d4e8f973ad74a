//! Resolves a profile name to a file, parses it, and validates it.
//!
//! Resolution and parsing are treated as the boring part -- the JSON
//! reader itself is `serde_json`, a black-box deserializer. Validation
//! is where this module earns its keep.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use cagebox_shared::{CageError, CageResult};
use serde::Deserialize;

use super::model::{CapabilityPolicy, DefaultAction, Profile, SyscallPolicy};

#[derive(Debug, Deserialize)]
struct RawProfile {
    profile_name: String,
    description: String,
    version: String,
    syscalls: RawSyscallPolicy,
    capabilities: Option<RawCapabilityPolicy>,
}

#[derive(Debug, Deserialize)]
struct RawSyscallPolicy {
    default_action: String,
    #[serde(default)]
    errno_value: Option<i64>,
    #[serde(default)]
    allowed: Vec<String>,
    #[serde(default)]
    blocked: Vec<String>,
    /// Per-syscall argument-value conditions. The schema admits them; this
    /// parses the structure (so malformed JSON still fails as
    /// `ProfileMalformed`, not silently) and then discards the conditions --
    /// treating the named syscall as unconditionally allowed. See the
    /// decision recorded in DESIGN.md.
    #[serde(default)]
    rules: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawCapabilityPolicy {
    #[serde(default)]
    drop_all: bool,
    #[serde(default)]
    keep: Vec<String>,
}

/// Resolves profile names against an ordered, fixed list of directories.
/// The list is a configuration input supplied by the caller, not
/// discovered at runtime.
pub struct ProfileLoader {
    search_path: Vec<PathBuf>,
}

impl ProfileLoader {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }

    /// Resolve `name` to `<dir>/<name>.json` across the search path, parse,
    /// and validate. First hit wins.
    pub fn load(&self, name: &str) -> CageResult<Profile> {
        let filename = format!("{name}.json");
        for dir in &self.search_path {
            let candidate = dir.join(&filename);
            if candidate.is_file() {
                return self.load_path(name, &candidate);
            }
        }
        Err(CageError::ProfileNotFound {
            name: name.to_string(),
            searched: self.search_path.clone(),
        })
    }

    fn load_path(&self, name: &str, path: &Path) -> CageResult<Profile> {
        let text = std::fs::read_to_string(path)?;
        let raw: RawProfile =
            serde_json::from_str(&text).map_err(|source| CageError::ProfileMalformed {
                path: path.to_path_buf(),
                source,
            })?;
        if raw.profile_name != name {
            tracing::warn!(
                file_name = %raw.profile_name,
                requested = %name,
                "profile_name field does not match the resolved file name"
            );
        }
        validate(raw)
    }
}

fn validate(raw: RawProfile) -> CageResult<Profile> {
    let default_action = match raw.syscalls.default_action.as_str() {
        "kill" => DefaultAction::Kill,
        "allow" => DefaultAction::Allow,
        "errno" => {
            let value = raw.syscalls.errno_value.ok_or_else(|| CageError::ProfileInvalid {
                reason: "default_action \"errno\" requires errno_value".to_string(),
            })?;
            if !(1..=4095).contains(&value) {
                return Err(CageError::ProfileInvalid {
                    reason: format!("errno_value {value} is outside the POSIX errno range 1..4095"),
                });
            }
            DefaultAction::Errno(value as u16)
        }
        other => {
            return Err(CageError::ProfileInvalid {
                reason: format!("default_action must be kill, errno, or allow, got {other:?}"),
            });
        }
    };

    if !raw.syscalls.rules.is_empty() {
        tracing::debug!(
            count = raw.syscalls.rules.len(),
            "ignoring conditional syscall rules; V1 treats named syscalls as unconditionally allowed"
        );
    }

    let allowed: BTreeSet<String> = raw.syscalls.allowed.into_iter().collect();
    let blocked: BTreeSet<String> = raw.syscalls.blocked.into_iter().collect();
    let overlap: Vec<&String> = allowed.intersection(&blocked).collect();
    if !overlap.is_empty() {
        return Err(CageError::ProfileInvalid {
            reason: format!("syscalls present in both allowed and blocked: {overlap:?}"),
        });
    }

    let capabilities = raw.capabilities.map(|c| CapabilityPolicy {
        drop_all: c.drop_all,
        keep: c.keep,
    });

    Ok(Profile {
        name: raw.profile_name,
        description: raw.description,
        version: raw.version,
        syscalls: SyscallPolicy {
            default_action,
            allowed,
            blocked,
        },
        capabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_profile(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(format!("{name}.json")), contents).unwrap();
    }

    #[test]
    fn loads_a_well_formed_profile() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            "minimal",
            r#"{
                "profile_name": "minimal",
                "description": "dynamic linker minimum",
                "version": "1.0.0",
                "syscalls": {
                    "default_action": "kill",
                    "allowed": ["read", "write", "execve", "exit"]
                }
            }"#,
        );

        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let profile = loader.load("minimal").unwrap();
        assert_eq!(profile.syscalls.default_action, DefaultAction::Kill);
        assert_eq!(profile.syscalls.allowed.len(), 4);
        assert!(profile.capabilities.is_none());
    }

    #[test]
    fn first_hit_wins_across_search_path() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_profile(
            second.path(),
            "dup",
            r#"{"profile_name":"dup","description":"d","version":"1","syscalls":{"default_action":"kill","allowed":["read"]}}"#,
        );
        write_profile(
            first.path(),
            "dup",
            r#"{"profile_name":"dup","description":"d","version":"2","syscalls":{"default_action":"kill","allowed":["read","write"]}}"#,
        );

        let loader = ProfileLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let profile = loader.load("dup").unwrap();
        assert_eq!(profile.version, "2");
        assert_eq!(profile.syscalls.allowed.len(), 2);
    }

    #[test]
    fn missing_profile_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let err = loader.load("nope").unwrap_err();
        assert!(matches!(err, CageError::ProfileNotFound { .. }));
    }

    #[test]
    fn malformed_json_is_malformed_not_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path(), "broken", "{ not json");
        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let err = loader.load("broken").unwrap_err();
        assert!(matches!(err, CageError::ProfileMalformed { .. }));
    }

    #[test]
    fn errno_default_without_value_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            "bad-errno",
            r#"{"profile_name":"bad-errno","description":"d","version":"1","syscalls":{"default_action":"errno","allowed":[]}}"#,
        );
        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let err = loader.load("bad-errno").unwrap_err();
        assert!(matches!(err, CageError::ProfileInvalid { .. }));
    }

    #[test]
    fn errno_value_out_of_range_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            "bad-range",
            r#"{"profile_name":"bad-range","description":"d","version":"1","syscalls":{"default_action":"errno","errno_value":9000,"allowed":[]}}"#,
        );
        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let err = loader.load("bad-range").unwrap_err();
        assert!(matches!(err, CageError::ProfileInvalid { .. }));
    }

    #[test]
    fn overlapping_allowed_and_blocked_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            "overlap",
            r#"{"profile_name":"overlap","description":"d","version":"1","syscalls":{"default_action":"kill","allowed":["read"],"blocked":["read"]}}"#,
        );
        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let err = loader.load("overlap").unwrap_err();
        assert!(matches!(err, CageError::ProfileInvalid { .. }));
    }

    #[test]
    fn conditional_rules_are_parsed_and_discarded() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            "conditional",
            r#"{
                "profile_name": "conditional",
                "description": "d",
                "version": "1",
                "syscalls": {
                    "default_action": "kill",
                    "allowed": ["openat"],
                    "rules": [{"syscall": "openat", "arg0": {"op": "eq", "value": 3}}]
                }
            }"#,
        );
        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let profile = loader.load("conditional").unwrap();
        assert!(profile.syscalls.allowed.contains("openat"));
    }

    #[test]
    fn capabilities_section_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            "with-caps",
            r#"{
                "profile_name": "with-caps",
                "description": "d",
                "version": "1",
                "syscalls": {"default_action": "kill", "allowed": ["read"]},
                "capabilities": {"drop_all": true, "keep": ["CAP_NET_BIND_SERVICE"]}
            }"#,
        );
        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let profile = loader.load("with-caps").unwrap();
        let caps = profile.capabilities.unwrap();
        assert!(caps.drop_all);
        assert_eq!(caps.keep, vec!["CAP_NET_BIND_SERVICE"]);
    }
}

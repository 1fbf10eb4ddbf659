// src/config.rs
// Loads relpack configuration from /etc, the user config dir and the project; provides defaults.

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::profile::{ProfileTable, ReleaseProfile};

pub const PROJECT_CFG: &str = "relpack.cfg";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub compiled_root: PathBuf,
    pub source_root: PathBuf,
    pub release_dir: PathBuf,
    // Defaults to <release_dir>/tmp when unset
    pub scratch_dir: Option<PathBuf>,
    pub write_checksum: bool,
    pub compression: u32,
    pub profiles: ProfileTable,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            compiled_root: PathBuf::from("bin"),
            source_root: PathBuf::from("src"),
            release_dir: PathBuf::from("release"),
            scratch_dir: None,
            write_checksum: true,
            compression: 6,
            profiles: ProfileTable::builtin(),
        }
    }
}

impl AppConfig {
    /// Layers system, user, project and explicit config files, then the
    /// environment. Only a broken `explicit` file is an error; discovered
    /// files that fail to load are reported and skipped.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = AppConfig::default();

        // 1) System config
        let sys_cfg = Path::new("/etc/relpack/config.cfg");
        cfg.apply_discovered(sys_cfg);

        // 2) User config: $XDG_CONFIG_HOME/relpack/config.cfg or ~/.config/relpack/config.cfg
        cfg.apply_discovered(&Self::user_config_path());

        // 3) Project config in the working directory
        cfg.apply_discovered(Path::new(PROJECT_CFG));

        // 4) Explicit --config
        if let Some(path) = explicit {
            let content = fs::read_to_string(path).map_err(|e| Error::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            cfg.apply_cfg_str(&content)
                .map_err(|message| Error::Config { path: path.to_path_buf(), message })?;
        }

        // 5) Environment overrides (highest priority)
        cfg.apply_env(|key| env::var(key).ok())
            .map_err(|message| Error::Config { path: PathBuf::from("<environment>"), message })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn user_config_path() -> PathBuf {
        env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("~/.config").expand_home())
            .join("relpack/config.cfg")
    }

    pub fn scratch_path(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(|| self.release_dir.join("tmp"))
    }

    fn apply_discovered(&mut self, path: &Path) {
        if !path.exists() {
            return;
        }
        let applied = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| self.apply_cfg_str(&content));
        match applied {
            Ok(()) => tracing::debug!("loaded config {}", path.display()),
            Err(e) => tracing::warn!("failed to load {}: {}", path.display(), e),
        }
    }

    fn apply_cfg_str(&mut self, content: &str) -> std::result::Result<(), String> {
        let mut section = String::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].trim().to_lowercase();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(format!("line {}: expected 'key = value', got '{}'", lineno + 1, line));
            };
            let key = key.trim();
            let value = value.trim();
            match section.as_str() {
                "paths" => match key {
                    "compiled_root" => self.compiled_root = PathBuf::from(value).expand_home(),
                    "source_root" => self.source_root = PathBuf::from(value).expand_home(),
                    "release_dir" => self.release_dir = PathBuf::from(value).expand_home(),
                    "scratch_dir" => self.scratch_dir = Some(PathBuf::from(value).expand_home()),
                    _ => tracing::warn!("unknown key '{}' in [paths]", key),
                },
                "release" => match key {
                    "checksum" => self.write_checksum = parse_bool(value)?,
                    "compression" => self.compression = parse_level(value)?,
                    _ => tracing::warn!("unknown key '{}' in [release]", key),
                },
                "profiles" => {
                    let groups = split_list(value);
                    let description = format!("packs {}", groups.join(", "));
                    self.profiles.insert(ReleaseProfile::new(key, description, groups))?;
                }
                _ => tracing::warn!("ignoring key '{}' in unknown section [{}]", key, section),
            }
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F) -> std::result::Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RELPACK_COMPILED_ROOT") {
            self.compiled_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("RELPACK_SOURCE_ROOT") {
            self.source_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("RELPACK_RELEASE_DIR") {
            self.release_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("RELPACK_SCRATCH_DIR") {
            self.scratch_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("RELPACK_CHECKSUM") {
            self.write_checksum = parse_bool(&v)?;
        }
        if let Some(v) = lookup("RELPACK_COMPRESSION") {
            self.compression = parse_level(&v)?;
        }
        Ok(())
    }

    /// The scratch directory is deleted recursively, so it must not contain
    /// the release directory or either artifact root.
    pub fn validate(&self) -> Result<()> {
        let scratch = absolute(&self.scratch_path());
        let guarded = [
            ("release_dir", &self.release_dir),
            ("compiled_root", &self.compiled_root),
            ("source_root", &self.source_root),
        ];
        for (name, path) in guarded {
            if absolute(path).starts_with(&scratch) {
                return Err(Error::Config {
                    path: self.scratch_path(),
                    message: format!("scratch directory must not contain {} ({})", name, path.display()),
                });
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{}'", other)),
    }
}

fn parse_level(value: &str) -> std::result::Result<u32, String> {
    match value.parse::<u32>() {
        Ok(n) if n <= 9 => Ok(n),
        _ => Err(format!("compression must be between 0 and 9, got '{}'", value)),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// Lexically absolute form of `path`, with `.` and `..` folded.
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for c in joined.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// Small helper to expand leading ~ in paths
trait ExpandHome {
    fn expand_home(self) -> PathBuf;
}

impl ExpandHome for PathBuf {
    fn expand_home(self) -> PathBuf {
        let s = self.to_string_lossy().to_string();
        if let Some(rest) = s.strip_prefix("~/") {
            if let Some(home) = dirs_next::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_follow_the_release_layout() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.compiled_root, PathBuf::from("bin"));
        assert_eq!(cfg.source_root, PathBuf::from("src"));
        assert_eq!(cfg.scratch_path(), PathBuf::from("release/tmp"));
        assert!(cfg.write_checksum);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn cfg_sections_are_applied() {
        let mut cfg = AppConfig::default();
        let content = "\
# project layout
[paths]
compiled_root = out/classes
release_dir = dist

[release]
checksum = no
compression = 9

[profiles]
graph-only = graph
full = ast, ctl
";
        cfg.apply_cfg_str(content).unwrap();
        assert_eq!(cfg.compiled_root, PathBuf::from("out/classes"));
        assert_eq!(cfg.scratch_path(), PathBuf::from("dist/tmp"));
        assert!(!cfg.write_checksum);
        assert_eq!(cfg.compression, 9);
        assert_eq!(cfg.profiles.resolve("graph-only").unwrap().groups, ["graph"]);
        assert_eq!(cfg.profiles.resolve("full").unwrap().groups, ["ast", "ctl"]);
    }

    #[test]
    fn empty_profile_is_an_error() {
        let mut cfg = AppConfig::default();
        assert!(cfg.apply_cfg_str("[profiles]\nnothing = ,\n").is_err());
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(AppConfig::default().apply_cfg_str("[release]\ncompression = 11\n").is_err());
        assert!(AppConfig::default().apply_cfg_str("[release]\nchecksum = maybe\n").is_err());
        assert!(AppConfig::default().apply_cfg_str("[paths]\njust a line\n").is_err());
    }

    #[test]
    fn environment_overrides_files() {
        let mut cfg = AppConfig::default();
        cfg.apply_cfg_str("[paths]\nrelease_dir = dist\n").unwrap();

        let env: HashMap<&str, &str> =
            [("RELPACK_RELEASE_DIR", "out"), ("RELPACK_SCRATCH_DIR", "scratch"), ("RELPACK_CHECKSUM", "0")]
                .into_iter()
                .collect();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.release_dir, PathBuf::from("out"));
        assert_eq!(cfg.scratch_path(), PathBuf::from("scratch"));
        assert!(!cfg.write_checksum);
    }

    #[test]
    fn scratch_may_not_swallow_release_or_roots() {
        let mut cfg = AppConfig::default();
        cfg.scratch_dir = Some(PathBuf::from("release"));
        assert!(matches!(cfg.validate(), Err(Error::Config { .. })));

        cfg.scratch_dir = Some(PathBuf::from("."));
        assert!(cfg.validate().is_err());

        cfg.scratch_dir = Some(PathBuf::from("release/../bin"));
        assert!(cfg.validate().is_err());

        cfg.scratch_dir = Some(PathBuf::from("release/scratch"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn explicit_missing_config_is_fatal() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.cfg"))).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}

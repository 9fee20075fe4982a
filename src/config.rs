use crate::error::{DepsError, Result};
use std::path::PathBuf;

pub const PIPFILE_SECTIONS_VAR: &str = "DEPS_SETTING_PIPFILE_SECTIONS";
pub const PIPFILE_LOCK_SECTIONS_VAR: &str = "DEPS_SETTING_PIPFILELOCK_SECTIONS";
pub const PIP_PATH_VAR: &str = "DEPS_SETTING_PIP_PATH";
pub const WARN_ON_MISSING_VERSIONS_VAR: &str = "DEPS_SETTING_WARN_ON_MISSING_VERSIONS";
pub const LOCKFILE_UPDATE_VAR: &str = "DEPS_SETTING_LOCKFILE_UPDATE";

/// Environment variable that turns on `[VERBOSE]` diagnostics.
pub const VERBOSE_VAR: &str = "PYDEPS_VERBOSE";

pub fn is_verbose() -> bool {
    std::env::var(VERBOSE_VAR).is_ok()
}

/// How the native locker is asked to refresh a lockfile during `act`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockfileUpdateMode {
    /// Re-lock everything (`pipenv update`, `poetry update`).
    #[default]
    All,
    /// Only re-lock the packages whose versions changed in the inventory.
    Targeted,
}

/// Settings recognised from the environment.
///
/// Pipfiles usually keep production and development requirements in one file,
/// so the managed sections are configurable rather than hard-coded.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub pipfile_sections: Vec<String>,
    pub pipfile_lock_sections: Vec<String>,
    pub pip_path: Option<PathBuf>,
    pub warn_on_missing_versions: bool,
    pub lockfile_update: LockfileUpdateMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pipfile_sections: vec!["packages".to_string(), "dev-packages".to_string()],
            pipfile_lock_sections: vec!["default".to_string(), "develop".to_string()],
            pip_path: None,
            warn_on_missing_versions: false,
            lockfile_update: LockfileUpdateMode::All,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(raw) = non_empty(lookup(PIPFILE_SECTIONS_VAR)) {
            settings.pipfile_sections = parse_section_list(PIPFILE_SECTIONS_VAR, &raw)?;
        }

        if let Some(raw) = non_empty(lookup(PIPFILE_LOCK_SECTIONS_VAR)) {
            settings.pipfile_lock_sections = parse_section_list(PIPFILE_LOCK_SECTIONS_VAR, &raw)?;
        }

        if let Some(raw) = non_empty(lookup(PIP_PATH_VAR)) {
            settings.pip_path = Some(PathBuf::from(raw));
        }

        if let Some(raw) = non_empty(lookup(WARN_ON_MISSING_VERSIONS_VAR)) {
            settings.warn_on_missing_versions = parse_flag(WARN_ON_MISSING_VERSIONS_VAR, &raw)?;
        }

        if let Some(raw) = non_empty(lookup(LOCKFILE_UPDATE_VAR)) {
            settings.lockfile_update = match raw.trim().trim_matches('"').to_lowercase().as_str() {
                "all" => LockfileUpdateMode::All,
                "targeted" => LockfileUpdateMode::Targeted,
                other => {
                    return Err(DepsError::Config(format!(
                        "{} must be \"all\" or \"targeted\", got '{}'",
                        LOCKFILE_UPDATE_VAR, other
                    )));
                }
            };
        }

        Ok(settings)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_section_list(key: &str, raw: &str) -> Result<Vec<String>> {
    serde_json::from_str::<Vec<String>>(raw).map_err(|e| {
        DepsError::Config(format!(
            "{} must be a JSON array of section names: {}",
            key, e
        ))
    })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(DepsError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_manage_production_and_development_sections() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.pipfile_sections, vec!["packages", "dev-packages"]);
        assert_eq!(settings.pipfile_lock_sections, vec!["default", "develop"]);
        assert!(settings.pip_path.is_none());
        assert!(!settings.warn_on_missing_versions);
        assert_eq!(settings.lockfile_update, LockfileUpdateMode::All);
    }

    #[test]
    fn reads_overrides_from_environment() {
        let settings = Settings::from_lookup(lookup_from(&[
            (PIPFILE_SECTIONS_VAR, r#"["packages"]"#),
            (PIPFILE_LOCK_SECTIONS_VAR, r#"["default", "custom"]"#),
            (PIP_PATH_VAR, "/opt/venv/bin/pip"),
            (WARN_ON_MISSING_VERSIONS_VAR, "true"),
            (LOCKFILE_UPDATE_VAR, "targeted"),
        ]))
        .unwrap();

        assert_eq!(settings.pipfile_sections, vec!["packages"]);
        assert_eq!(settings.pipfile_lock_sections, vec!["default", "custom"]);
        assert_eq!(settings.pip_path, Some(PathBuf::from("/opt/venv/bin/pip")));
        assert!(settings.warn_on_missing_versions);
        assert_eq!(settings.lockfile_update, LockfileUpdateMode::Targeted);
    }

    #[test]
    fn rejects_malformed_section_list() {
        let err = Settings::from_lookup(lookup_from(&[(PIPFILE_SECTIONS_VAR, "packages")]))
            .unwrap_err();
        assert!(matches!(err, DepsError::Config(_)));
    }

    #[test]
    fn rejects_unknown_update_mode() {
        let err = Settings::from_lookup(lookup_from(&[(LOCKFILE_UPDATE_VAR, "some")]))
            .unwrap_err();
        assert!(matches!(err, DepsError::Config(_)));
    }
}

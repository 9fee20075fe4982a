//! Pipenv `Pipfile.lock` lockfiles.

use crate::error::{DepsError, Result};
use crate::files::{DependencyRecord, ParsedContent};
use serde_json::Value;
use std::path::Path;

const DEFAULT_SOURCE: &str = "pypi";

pub fn parse(path: &Path, content: &str) -> Result<ParsedContent> {
    let data: Value = serde_json::from_str(content)
        .map_err(|e| DepsError::parse(path, format!("Failed to parse JSON: {}", e)))?;
    let sections = data
        .as_object()
        .ok_or_else(|| DepsError::parse(path, "top level is not a JSON object"))?;

    let mut parsed = ParsedContent::default();
    for (section, packages) in sections {
        if section == "_meta" {
            continue;
        }
        let Some(packages) = packages.as_object() else {
            continue;
        };

        for (name, details) in packages {
            // VCS and path installs carry no version
            let Some(version) = details.get("version").and_then(Value::as_str) else {
                continue;
            };
            let version = version.trim_start_matches("==");
            let source = details
                .get("index")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_SOURCE);

            parsed.push(
                path,
                DependencyRecord::new(name.as_str(), source, version, section.as_str()),
            );
        }
    }

    Ok(parsed)
}

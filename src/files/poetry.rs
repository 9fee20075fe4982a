//! Poetry `pyproject.toml` manifests and `poetry.lock` lockfiles.

use crate::error::{DepsError, Result};
use crate::files::{DependencyRecord, ParsedContent};
use crate::python::Constraint;
use crate::utils::toml::TomlUtils;
use serde::Deserialize;
use std::path::Path;
use toml_edit::{DocumentMut, Item, TableLike};

const DEFAULT_SOURCE: &str = "pypi";

fn load_document(path: &Path, content: &str) -> Result<DocumentMut> {
    content
        .parse::<DocumentMut>()
        .map_err(|e| DepsError::parse(path, format!("Failed to parse TOML: {}", e)))
}

fn poetry_table<'a>(path: &Path, doc: &'a DocumentMut) -> Result<&'a dyn TableLike> {
    doc.get("tool")
        .and_then(|tool| tool.get("poetry"))
        .and_then(|poetry| poetry.as_table_like())
        .ok_or_else(|| DepsError::parse(path, "no [tool.poetry] section; not a Poetry project"))
}

/// `(section, table)` pairs in document order: `dependencies`,
/// `dev-dependencies` and every `group.<name>`.
fn dependency_tables(poetry: &dyn TableLike) -> Vec<(String, &dyn TableLike)> {
    let mut tables = Vec::new();

    for (key, item) in poetry.iter() {
        match key {
            "dependencies" | "dev-dependencies" => {
                if let Some(table) = item.as_table_like() {
                    tables.push((key.to_string(), table));
                }
            }
            "group" => {
                let Some(groups) = item.as_table_like() else {
                    continue;
                };
                for (group, group_item) in groups.iter() {
                    if let Some(table) = group_item
                        .get("dependencies")
                        .and_then(|deps| deps.as_table_like())
                    {
                        tables.push((format!("group.{}", group), table));
                    }
                }
            }
            _ => {}
        }
    }

    tables
}

pub fn parse_pyproject(path: &Path, content: &str) -> Result<ParsedContent> {
    let doc = load_document(path, content)?;
    let poetry = poetry_table(path, &doc)?;
    let mut parsed = ParsedContent::default();

    for (section, table) in dependency_tables(poetry) {
        for (name, entry) in table.iter() {
            // the interpreter requirement is not a package
            if name.eq_ignore_ascii_case("python") {
                continue;
            }

            let Some(raw) = TomlUtils::extract_constraint(entry) else {
                // multiple-constraint arrays are left to Poetry
                continue;
            };
            let constraint = Constraint::parse(&raw)
                .map_err(|reason| DepsError::parse(path, format!("[{}] {}", section, reason)))?;

            let source = TomlUtils::extract_field(entry, "source")
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

            parsed.push(
                path,
                DependencyRecord::new(name, source, constraint.to_string(), section.as_str()),
            );
        }
    }

    Ok(parsed)
}

fn section_item_mut<'a>(doc: &'a mut DocumentMut, section: &str) -> Option<&'a mut Item> {
    let poetry = doc.get_mut("tool")?.get_mut("poetry")?;
    match section.strip_prefix("group.") {
        Some(group) => poetry.get_mut("group")?.get_mut(group)?.get_mut("dependencies"),
        None => poetry.get_mut(section),
    }
}

pub fn rewrite_pyproject(
    path: &Path,
    content: &str,
    record: &DependencyRecord,
    constraint: &str,
) -> Result<String> {
    let mut doc = load_document(path, content)?;
    let not_found = || DepsError::DependencyNotFound {
        path: path.to_path_buf(),
        name: record.name.clone(),
    };

    let table = section_item_mut(&mut doc, &record.section)
        .and_then(|item| item.as_table_like_mut())
        .ok_or_else(not_found)?;

    let key = TomlUtils::find_key(&*table, &record.name).ok_or_else(not_found)?;
    let item = table.get_mut(&key).ok_or_else(not_found)?;

    if !TomlUtils::update_constraint(item, constraint) {
        return Err(DepsError::parse(
            path,
            format!("Unsupported declaration format for '{}'", record.name),
        ));
    }

    Ok(doc.to_string())
}

#[derive(Debug, Deserialize)]
struct PoetryLockData {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    source: Option<PackageSource>,
}

#[derive(Debug, Deserialize)]
struct PackageSource {
    #[serde(rename = "type")]
    kind: Option<String>,
}

pub fn parse_lock(path: &Path, content: &str) -> Result<ParsedContent> {
    let data: PoetryLockData = toml::from_str(content)
        .map_err(|e| DepsError::parse(path, format!("Failed to parse TOML: {}", e)))?;

    let mut parsed = ParsedContent::default();
    for package in data.package {
        let source = package
            .source
            .and_then(|s| s.kind)
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let section = package.category.unwrap_or_else(|| "main".to_string());
        parsed.push(
            path,
            DependencyRecord::new(package.name, source, package.version, section),
        );
    }

    Ok(parsed)
}

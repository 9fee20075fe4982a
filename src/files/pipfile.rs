//! Pipenv `Pipfile` manifests.

use crate::error::{DepsError, Result};
use crate::files::{DependencyRecord, ParsedContent};
use crate::python::Constraint;
use crate::utils::toml::TomlUtils;
use std::path::Path;
use toml_edit::DocumentMut;

/// Top-level tables that never hold packages.
const RESERVED_TABLES: &[&str] = &["source", "requires", "scripts", "pipenv"];
const DEFAULT_SOURCE: &str = "pypi";

fn load_document(path: &Path, content: &str) -> Result<DocumentMut> {
    content
        .parse::<DocumentMut>()
        .map_err(|e| DepsError::parse(path, format!("Failed to parse TOML: {}", e)))
}

pub fn parse(path: &Path, content: &str) -> Result<ParsedContent> {
    let doc = load_document(path, content)?;
    let mut parsed = ParsedContent::default();

    for (section, item) in doc.iter() {
        if RESERVED_TABLES.contains(&section) {
            continue;
        }
        let Some(table) = item.as_table_like() else {
            continue;
        };

        for (name, entry) in table.iter() {
            let Some(raw) = TomlUtils::extract_constraint(entry) else {
                return Err(DepsError::parse(
                    path,
                    format!("[{}] entry '{}' is neither a string nor a table", section, name),
                ));
            };
            let constraint = Constraint::parse(&raw)
                .map_err(|reason| DepsError::parse(path, format!("[{}] {}", section, reason)))?;

            let source = TomlUtils::extract_field(entry, "index")
                .and_then(|index| source_url(&doc, &index).or(Some(index)))
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

            parsed.push(
                path,
                DependencyRecord::new(name, source, constraint.to_string(), section),
            );
        }
    }

    Ok(parsed)
}

/// URL of the `[[source]]` entry called `index`.
fn source_url(doc: &DocumentMut, index: &str) -> Option<String> {
    doc.get("source")?
        .as_array_of_tables()?
        .iter()
        .find(|source| source.get("name").and_then(|n| n.as_str()) == Some(index))
        .and_then(|source| source.get("url"))
        .and_then(|url| url.as_str())
        .map(|url| url.to_string())
}

pub fn rewrite(
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

    let table = doc
        .get_mut(&record.section)
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

#[cfg(test)]
mod tests {
    use super::*;

    const PIPFILE: &str = r#"[[source]]
url = "https://pypi.org/simple"
verify_ssl = true
name = "pypi"

[[source]]
url = "https://internal.example/simple"
verify_ssl = true
name = "internal"

[packages]
requests = "*"
Django = { version = ">=4.2,<5.0", extras = ["bcrypt"] }
private-lib = { version = "==1.0", index = "internal" }

[dev-packages]
pytest = ">=7.0"  # test runner

[requires]
python_version = "3.11"
"#;

    #[test]
    fn parses_packages_and_dev_packages() {
        let parsed = parse(Path::new("Pipfile"), PIPFILE).unwrap();
        let summary: Vec<_> = parsed
            .records
            .iter()
            .map(|r| (r.name.as_str(), r.constraint.as_str(), r.section.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("requests", "*", "packages"),
                ("Django", ">=4.2,<5.0", "packages"),
                ("private-lib", "==1.0", "packages"),
                ("pytest", ">=7.0", "dev-packages"),
            ]
        );
        assert_eq!(parsed.records[0].source, "pypi");
        assert_eq!(parsed.records[2].source, "https://internal.example/simple");
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        assert!(matches!(
            parse(Path::new("Pipfile"), "[packages\nrequests = "),
            Err(DepsError::Parse { .. })
        ));
    }

    #[test]
    fn rewrite_preserves_everything_else() {
        let record = DependencyRecord::new("django", "pypi", ">=4.2,<5.0", "packages");
        let updated = rewrite(Path::new("Pipfile"), PIPFILE, &record, "==5.0.1").unwrap();
        let expected = PIPFILE.replace(
            r#"Django = { version = ">=4.2,<5.0", extras = ["bcrypt"] }"#,
            r#"Django = { version = "==5.0.1", extras = ["bcrypt"] }"#,
        );
        assert_eq!(updated, expected);
    }

    #[test]
    fn rewrite_keeps_trailing_comment() {
        let record = DependencyRecord::new("pytest", "pypi", ">=7.0", "dev-packages");
        let updated = rewrite(Path::new("Pipfile"), PIPFILE, &record, "==8.2.0").unwrap();
        assert!(updated.contains("pytest = \"==8.2.0\"  # test runner\n"));

        let again = rewrite(Path::new("Pipfile"), &updated, &record, "==8.2.0").unwrap();
        assert_eq!(updated, again);
    }

    #[test]
    fn rewrite_in_wrong_section_is_not_found() {
        let record = DependencyRecord::new("pytest", "pypi", ">=7.0", "packages");
        assert!(matches!(
            rewrite(Path::new("Pipfile"), PIPFILE, &record, "==8.2.0"),
            Err(DepsError::DependencyNotFound { .. })
        ));
    }
}

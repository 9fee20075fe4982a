use crate::python::same_name;
use toml_edit::{Item, TableLike, Value};

/// Helpers for inspecting and updating dependency tables in TOML manifests.
pub struct TomlUtils;

impl TomlUtils {
    /// Extracts the version constraint from a string, inline table, or standard table.
    /// Entries without a `version` (git, path, url) are unconstrained.
    pub fn extract_constraint(item: &Item) -> Option<String> {
        if let Some(str_value) = item.as_str() {
            return Some(str_value.to_string());
        }

        if let Some(table) = item.as_table_like() {
            return Some(
                table
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or("*")
                    .to_string(),
            );
        }

        None
    }

    /// Extracts a string field such as `index` or `source` from a table entry.
    pub fn extract_field(item: &Item, field: &str) -> Option<String> {
        item.as_table_like()
            .and_then(|table| table.get(field))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Finds the key of a dependency, matching names case-insensitively.
    pub fn find_key(table: &dyn TableLike, name: &str) -> Option<String> {
        table
            .iter()
            .find(|(key, _)| same_name(key, name))
            .map(|(key, _)| key.to_string())
    }

    /// Updates an item's constraint in place, keeping surrounding whitespace and
    /// comments. Returns true if a change was applied.
    pub fn update_constraint(item: &mut Item, constraint: &str) -> bool {
        if let Some(value) = item.as_value_mut() {
            if value.is_str() {
                replace_keeping_decor(value, constraint);
                return true;
            }
        }

        if let Some(inline_table) = item.as_inline_table_mut() {
            match inline_table.get_mut("version") {
                Some(existing) => replace_keeping_decor(existing, constraint),
                None => {
                    inline_table.insert("version", Value::from(constraint));
                }
            }
            return true;
        }

        if let Some(table) = item.as_table_mut() {
            match table.get_mut("version").and_then(|v| v.as_value_mut()) {
                Some(existing) => replace_keeping_decor(existing, constraint),
                None => {
                    table.insert("version", toml_edit::value(constraint));
                }
            }
            return true;
        }

        false
    }
}

fn replace_keeping_decor(value: &mut Value, constraint: &str) {
    let decor = value.decor().clone();
    *value = Value::from(constraint);
    *value.decor_mut() = decor;
}

pub mod constraint;
pub mod version;

pub use constraint::Constraint;
pub use version::{Version, VersionComparator};

/// PEP 503 normalized project name: lowercase, runs of `-`, `_`, `.` collapsed to `-`.
pub fn canonical_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        pending_separator = false;
        normalized.extend(ch.to_lowercase());
    }
    normalized
}

pub fn same_name(a: &str, b: &str) -> bool {
    canonical_name(a) == canonical_name(b)
}

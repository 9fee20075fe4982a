//! pip requirements files (`requirements.txt`, `*.in`, ...).

use crate::error::{DepsError, Result};
use crate::files::{DependencyRecord, ParsedContent, file_dir};
use crate::python::{Constraint, same_name};
use std::ops::Range;
use std::path::Path;

const DEFAULT_SOURCE: &str = "pypi";

/// A requirement line split into the parts the updater cares about.
#[derive(Debug, PartialEq, Eq)]
struct RequirementLine<'a> {
    name: &'a str,
    /// Byte range of the version specifier inside the line (may be empty).
    spec: Range<usize>,
}

pub fn parse(path: &Path, content: &str) -> Result<ParsedContent> {
    let mut parsed = ParsedContent::default();
    let source = index_url(content).unwrap_or_else(|| DEFAULT_SOURCE.to_string());
    let base = file_dir(path);

    for (number, line) in logical_lines(content) {
        let trimmed = line.trim();

        if let Some(reference) = option_value(trimmed, &["-r", "--requirement"]) {
            parsed.references.push(base.join(reference));
            continue;
        }

        let Some(requirement) = parse_requirement_line(line) else {
            continue;
        };

        let spec_text = &line[requirement.spec.clone()];
        let constraint = Constraint::parse(spec_text).map_err(|reason| {
            DepsError::parse(path, format!("line {}: {}", number + 1, reason))
        })?;

        parsed.push(
            path,
            DependencyRecord::new(requirement.name, source.clone(), constraint.to_string(), ""),
        );
    }

    Ok(parsed)
}

pub fn rewrite(
    path: &Path,
    content: &str,
    record: &DependencyRecord,
    constraint: &str,
) -> Result<String> {
    for (_, start, line) in logical_lines_with_offsets(content) {
        let Some(requirement) = parse_requirement_line(line) else {
            continue;
        };
        if !same_name(requirement.name, &record.name) {
            continue;
        }

        let mut updated = String::with_capacity(content.len() + constraint.len());
        updated.push_str(&content[..start + requirement.spec.start]);
        updated.push_str(constraint);
        updated.push_str(&content[start + requirement.spec.end..]);
        return Ok(updated);
    }

    Err(DepsError::DependencyNotFound {
        path: path.to_path_buf(),
        name: record.name.clone(),
    })
}

fn logical_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    logical_lines_with_offsets(content).map(|(number, _, line)| (number, line))
}

/// Physical lines that start a logical line, with their byte offset.
/// Lines continued from a previous `\` line only carry options such as `--hash`.
fn logical_lines_with_offsets(content: &str) -> impl Iterator<Item = (usize, usize, &str)> {
    let mut offset = 0;
    let mut continued = false;
    content
        .split_inclusive('\n')
        .enumerate()
        .filter_map(move |(number, raw)| {
            let start = offset;
            offset += raw.len();
            let line = raw.trim_end_matches(['\n', '\r']);
            let is_continuation = continued;
            continued = strip_comment(line).trim_end().ends_with('\\');
            (!is_continuation).then_some((number, start, line))
        })
}

fn strip_comment(line: &str) -> &str {
    match comment_start(line) {
        Some(index) => &line[..index],
        None => line,
    }
}

/// A `#` at the start of the line or preceded by whitespace begins a comment.
fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    bytes
        .iter()
        .enumerate()
        .find(|(i, b)| **b == b'#' && (*i == 0 || bytes[*i - 1].is_ascii_whitespace()))
        .map(|(i, _)| i)
}

/// Value of `-r file`, `-rfile`, `--requirement file` or `--requirement=file`.
fn option_value<'a>(line: &'a str, names: &[&str]) -> Option<&'a str> {
    let line = strip_comment(line).trim();
    for name in names {
        let Some(rest) = line.strip_prefix(name) else {
            continue;
        };
        let value = if name.starts_with("--") {
            if let Some(v) = rest.strip_prefix('=') {
                v
            } else if rest.starts_with(char::is_whitespace) {
                rest
            } else {
                continue;
            }
        } else {
            rest
        };
        let value = value.trim();
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

fn index_url(content: &str) -> Option<String> {
    logical_lines(content)
        .find_map(|(_, line)| option_value(line.trim(), &["-i", "--index-url"]))
        .map(str::to_string)
}

fn parse_requirement_line(line: &str) -> Option<RequirementLine<'_>> {
    let body_end = comment_start(line).unwrap_or(line.len());
    let body = &line[..body_end];
    let start = body.len() - body.trim_start().len();
    let rest = &body[start..];

    // options, editable installs, paths and URLs are not managed
    let first = rest.chars().next()?;
    if !first.is_ascii_alphanumeric() || rest.contains("://") {
        return None;
    }

    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        .unwrap_or(rest.len());
    let name = &rest[..name_len];
    let mut pos = start + name_len;

    let after_name = &body[pos..];
    let trimmed = after_name.trim_start();
    if trimmed.starts_with('[') {
        let close = trimmed.find(']')?;
        pos += after_name.len() - trimmed.len() + close + 1;
    }
    let bare_end = pos;

    let tail = &body[pos..];
    pos += tail.len() - tail.trim_start().len();

    let spec_region = &body[pos..];
    let mut spec_end = spec_region.len();
    for marker in [";", " --", "\t--", "\\"] {
        if let Some(index) = spec_region.find(marker) {
            spec_end = spec_end.min(index);
        }
    }
    let spec_text = spec_region[..spec_end].trim_end();

    if spec_text.starts_with('@') {
        return None;
    }

    if spec_text.is_empty() {
        return Some(RequirementLine {
            name,
            spec: bare_end..bare_end,
        });
    }

    Some(RequirementLine {
        name,
        spec: pos..pos + spec_text.len(),
    })
}

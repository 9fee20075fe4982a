use crate::python::version::{Release, Version};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(===|==|!=|~=|>=|<=|>|<|\^|~|=)?\s*([^\s,|]+)").expect("clause pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterEqual,
    LessEqual,
    Greater,
    Less,
    /// `~=`
    Compatible,
    /// `===`
    Arbitrary,
    /// Poetry `^`
    Caret,
    /// Poetry `~`
    Tilde,
}

impl Operator {
    fn from_symbol(symbol: Option<&str>) -> Self {
        match symbol {
            Some("===") => Operator::Arbitrary,
            Some("!=") => Operator::NotEqual,
            Some("~=") => Operator::Compatible,
            Some(">=") => Operator::GreaterEqual,
            Some("<=") => Operator::LessEqual,
            Some(">") => Operator::Greater,
            Some("<") => Operator::Less,
            Some("^") => Operator::Caret,
            Some("~") => Operator::Tilde,
            _ => Operator::Equal,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::GreaterEqual => ">=",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Compatible => "~=",
            Operator::Arbitrary => "===",
            Operator::Caret => "^",
            Operator::Tilde => "~",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub operator: Operator,
    pub version: Version,
    /// `==1.2.*` / `!=1.2.*`
    pub wildcard: bool,
}

/// A version constraint: PEP 440 specifiers, Poetry `^`/`~`/bare versions and
/// `||` unions. An empty constraint (or `*`) allows every version.
#[derive(Debug, Clone, Default)]
pub struct Constraint {
    alternatives: Vec<Vec<Clause>>,
}

impl Constraint {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let mut clauses = Vec::new();
            for caps in CLAUSE.captures_iter(alternative) {
                let token = &caps[2];
                if token == "*" {
                    continue;
                }
                clauses.push(Self::parse_clause(
                    caps.get(1).map(|m| m.as_str()),
                    token,
                    raw,
                )?);
            }

            if clauses.is_empty() {
                // `*` inside a union allows everything
                return Ok(Self::any());
            }
            alternatives.push(clauses);
        }

        Ok(Self { alternatives })
    }

    fn parse_clause(symbol: Option<&str>, token: &str, raw: &str) -> Result<Clause, String> {
        let operator = Operator::from_symbol(symbol);

        if operator == Operator::Arbitrary {
            return Ok(Clause {
                operator,
                version: Version::parse(token),
                wildcard: false,
            });
        }

        let (text, wildcard) = match token.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (token, false),
        };

        if wildcard && !matches!(operator, Operator::Equal | Operator::NotEqual) {
            return Err(format!(
                "wildcard only allowed with == or != in '{}'",
                raw
            ));
        }

        let version = Version::parse_strict(text)
            .ok_or_else(|| format!("invalid version '{}' in '{}'", text, raw))?;

        if operator == Operator::Compatible
            && version.release().map(|r| r.segments.len()).unwrap_or(0) < 2
        {
            return Err(format!("'~=' needs at least two release segments in '{}'", raw));
        }

        Ok(Clause {
            operator,
            version,
            wildcard,
        })
    }

    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn contains(&self, version: &Version) -> bool {
        if self.is_any() {
            return true;
        }

        self.alternatives
            .iter()
            .any(|clauses| clauses.iter().all(|clause| clause.matches(version)))
    }
}

impl Clause {
    fn matches(&self, candidate: &Version) -> bool {
        if self.operator == Operator::Arbitrary {
            return candidate.original.eq_ignore_ascii_case(&self.version.original);
        }

        let (Some(spec), Some(_)) = (self.version.release(), candidate.release()) else {
            return false;
        };

        let public = if spec.local.is_some() {
            candidate.clone()
        } else {
            candidate.without_local()
        };

        match self.operator {
            Operator::Equal if self.wildcard => prefix_matches(spec, &public),
            Operator::NotEqual if self.wildcard => !prefix_matches(spec, &public),
            Operator::Equal => public == self.version,
            Operator::NotEqual => public != self.version,
            Operator::GreaterEqual => public >= self.version,
            Operator::LessEqual => public <= self.version,
            Operator::Greater => public > self.version,
            Operator::Less => {
                public < self.version
                    && !(public.is_prerelease()
                        && !self.version.is_prerelease()
                        && same_release(&public, &self.version))
            }
            Operator::Compatible => {
                let prefix = &spec.segments[..spec.segments.len() - 1];
                public >= self.version && segments_start_with(&public, spec.epoch, prefix)
            }
            Operator::Caret => {
                let bump = spec
                    .segments
                    .iter()
                    .position(|s| *s != 0)
                    .unwrap_or(spec.segments.len() - 1);
                public >= self.version && public < upper_bound(spec, bump)
            }
            Operator::Tilde => {
                let bump = if spec.segments.len() == 1 { 0 } else { 1 };
                public >= self.version && public < upper_bound(spec, bump)
            }
            Operator::Arbitrary => false,
        }
    }
}

fn prefix_matches(spec: &Release, candidate: &Version) -> bool {
    segments_start_with(candidate, spec.epoch, &spec.segments)
}

fn segments_start_with(candidate: &Version, epoch: u64, prefix: &[u64]) -> bool {
    let Some(release) = candidate.release() else {
        return false;
    };
    if release.epoch != epoch {
        return false;
    }
    prefix
        .iter()
        .enumerate()
        .all(|(i, part)| release.segments.get(i).copied().unwrap_or(0) == *part)
}

fn same_release(a: &Version, b: &Version) -> bool {
    match (a.release(), b.release()) {
        (Some(ra), Some(rb)) => {
            let len = ra.segments.len().max(rb.segments.len());
            ra.epoch == rb.epoch
                && (0..len).all(|i| {
                    ra.segments.get(i).copied().unwrap_or(0)
                        == rb.segments.get(i).copied().unwrap_or(0)
                })
        }
        _ => false,
    }
}

/// `segments[..index]` with `segments[index]` incremented, as a `.dev0`-free final release.
fn upper_bound(spec: &Release, index: usize) -> Version {
    let mut parts: Vec<u64> = spec.segments.iter().take(index).copied().collect();
    parts.push(spec.segments.get(index).copied().unwrap_or(0) + 1);
    let text = parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(".");
    let text = if spec.epoch > 0 {
        format!("{}!{}", spec.epoch, text)
    } else {
        text
    };
    Version::parse(&text)
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.symbol(), self.version)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("*");
        }

        let rendered = self
            .alternatives
            .iter()
            .map(|clauses| {
                clauses
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect::<Vec<_>>()
            .join(" || ");
        f.write_str(&rendered)
    }
}

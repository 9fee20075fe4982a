use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static PEP440: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^\s*v?
        (?:(?P<epoch>\d+)!)?
        (?P<release>\d+(?:\.\d+)*)
        (?:[-_.]?(?P<pre_l>alpha|beta|preview|pre|rc|a|b|c)[-_.]?(?P<pre_n>\d+)?)?
        (?:-(?P<post_n1>\d+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>\d+)?)?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>\d+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$",
    )
    .expect("PEP 440 pattern is valid")
});

/// Version representation for Python packages
#[derive(Debug, Clone)]
pub struct Version {
    pub original: String,
    pub parsed: VersionType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionType {
    Pep440(Release),
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreKind {
    Alpha,
    Beta,
    Rc,
}

#[derive(Debug, Clone)]
pub struct Release {
    pub epoch: u64,
    pub segments: Vec<u64>,
    pub pre: Option<(PreKind, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<String>,
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let parsed = match Self::parse_pep440(version) {
            Some(release) => VersionType::Pep440(release),
            None => VersionType::Unknown(version.trim().to_string()),
        };

        Version {
            original: version.trim().to_string(),
            parsed,
        }
    }

    /// Parses a version, returning `None` for anything that is not PEP 440.
    pub fn parse_strict(version: &str) -> Option<Self> {
        let parsed = Self::parse(version);
        parsed.release().is_some().then_some(parsed)
    }

    fn parse_pep440(version: &str) -> Option<Release> {
        let caps = PEP440.captures(version)?;

        let number = |name: &str| -> Option<u64> {
            caps.name(name).and_then(|m| m.as_str().parse::<u64>().ok())
        };

        let segments = caps
            .name("release")?
            .as_str()
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()?;

        let pre = caps.name("pre_l").map(|label| {
            let kind = match label.as_str().to_lowercase().as_str() {
                "a" | "alpha" => PreKind::Alpha,
                "b" | "beta" => PreKind::Beta,
                _ => PreKind::Rc,
            };
            (kind, number("pre_n").unwrap_or(0))
        });

        let post = if caps.name("post_n1").is_some() {
            number("post_n1")
        } else if caps.name("post_l").is_some() {
            Some(number("post_n2").unwrap_or(0))
        } else {
            None
        };

        // `dev` without a number is dev0
        let dev = if caps.name("dev_l").is_some() {
            Some(number("dev_n").unwrap_or(0))
        } else {
            None
        };

        Some(Release {
            epoch: number("epoch").unwrap_or(0),
            segments,
            pre,
            post,
            dev,
            local: caps.name("local").map(|m| m.as_str().to_lowercase()),
        })
    }

    pub fn release(&self) -> Option<&Release> {
        match &self.parsed {
            VersionType::Pep440(release) => Some(release),
            VersionType::Unknown(_) => None,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        match &self.parsed {
            VersionType::Pep440(r) => r.pre.is_some() || r.dev.is_some(),
            VersionType::Unknown(_) => false,
        }
    }

    /// The version with its local label (`+ubuntu1`) dropped.
    pub fn without_local(&self) -> Version {
        match &self.parsed {
            VersionType::Pep440(r) if r.local.is_some() => {
                let mut release = r.clone();
                release.local = None;
                let original = self
                    .original
                    .split_once('+')
                    .map(|(public, _)| public.to_string())
                    .unwrap_or_else(|| self.original.clone());
                Version {
                    original,
                    parsed: VersionType::Pep440(release),
                }
            }
            _ => self.clone(),
        }
    }
}

impl Release {
    /// Release segments with trailing zeros removed, so `1.0` sorts equal to `1.0.0`.
    fn trimmed_segments(&self) -> &[u64] {
        let mut end = self.segments.len();
        while end > 0 && self.segments[end - 1] == 0 {
            end -= 1;
        }
        &self.segments[..end]
    }

    fn pre_key(&self) -> (u8, Option<(PreKind, u64)>) {
        match (self.pre, self.post, self.dev) {
            // 1.0.dev1 sorts before 1.0a1
            (None, None, Some(_)) => (0, None),
            (Some(pre), _, _) => (1, Some(pre)),
            (None, _, _) => (2, None),
        }
    }

    fn post_key(&self) -> (u8, u64) {
        match self.post {
            None => (0, 0),
            Some(n) => (1, n),
        }
    }

    fn dev_key(&self) -> (u8, u64) {
        match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        }
    }
}

impl Ord for Release {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_segments().cmp(other.trimmed_segments()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialEq for Release {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Release {}

impl PartialOrd for Release {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (VersionType::Pep440(a), VersionType::Pep440(b)) => a.cmp(b),
            (VersionType::Unknown(_), VersionType::Pep440(_)) => Ordering::Less,
            (VersionType::Pep440(_), VersionType::Unknown(_)) => Ordering::Greater,
            (VersionType::Unknown(a), VersionType::Unknown(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

pub struct VersionComparator;

impl VersionComparator {
    /// Check if version `a` is newer than version `b`
    pub fn is_newer(a: &str, b: &str) -> bool {
        let va = Version::parse(a);
        let vb = Version::parse(b);
        va > vb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v1 = Version::parse("1.0.0");
        let v2 = Version::parse("1.0.1");
        assert!(v2 > v1);
        assert_eq!(Version::parse("1.0"), Version::parse("1.0.0"));
    }

    #[test]
    fn orders_pre_post_and_dev_releases() {
        let ordered = [
            "1.0.dev0", "1.0a1", "1.0b2", "1.0rc1", "1.0", "1.0.post1", "1.1",
        ];
        for pair in ordered.windows(2) {
            assert!(
                Version::parse(pair[0]) < Version::parse(pair[1]),
                "{} should sort before {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn epoch_outranks_release() {
        assert!(Version::parse("1!0.1") > Version::parse("2024.1"));
    }

    #[test]
    fn strict_parse_rejects_garbage() {
        assert!(Version::parse_strict("2.5.0").is_some());
        assert!(Version::parse_strict("latest").is_none());
    }

    #[test]
    fn is_newer_compares_numerically() {
        assert!(VersionComparator::is_newer("2.10.0", "2.9.1"));
        assert!(!VersionComparator::is_newer("2.9.1", "2.10.0"));
    }
}

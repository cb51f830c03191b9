use std::cmp::Ordering;

/// Version tag representation supporting the formats seen in deno.land imports
/// (`0.60.0`, `v1.2.3`, `v1.0.0-rc.1`, `1.2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub original: String,
    pub parsed: VersionType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionType {
    Semantic(semver::Version),
    Numeric(Vec<u64>),
    Unknown(String),
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let trimmed = version
            .strip_prefix('v')
            .or_else(|| version.strip_prefix('V'))
            .unwrap_or(version);

        let parsed = if let Ok(v) = semver::Version::parse(trimmed) {
            VersionType::Semantic(v)
        } else if let Some(numeric) = Self::parse_numeric(trimmed) {
            VersionType::Numeric(numeric)
        } else {
            VersionType::Unknown(version.to_string())
        };

        Version {
            original: version.to_string(),
            parsed,
        }
    }

    fn parse_numeric(version: &str) -> Option<Vec<u64>> {
        let numbers = version
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        if numbers.is_empty() {
            None
        } else {
            Some(numbers)
        }
    }

    pub fn is_stable(&self) -> bool {
        let lower = self.original.to_lowercase();

        let unstable_markers = ["alpha", "beta", "rc", "canary", "dev", "preview", "next"];
        if unstable_markers.iter().any(|marker| lower.contains(marker)) {
            return false;
        }

        match &self.parsed {
            VersionType::Semantic(v) => v.pre.is_empty(),
            _ => true,
        }
    }

    /// Ordering between two versions, `None` when the formats cannot be compared.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (&self.parsed, &other.parsed) {
            (VersionType::Semantic(a), VersionType::Semantic(b)) => Some(a.cmp(b)),
            (VersionType::Numeric(a), VersionType::Numeric(b)) => Some(Self::cmp_numeric(a, b)),
            (VersionType::Semantic(a), VersionType::Numeric(b)) => {
                Some(Self::cmp_numeric(&[a.major, a.minor, a.patch], b))
            }
            (VersionType::Numeric(a), VersionType::Semantic(b)) => {
                Some(Self::cmp_numeric(a, &[b.major, b.minor, b.patch]))
            }
            _ => None,
        }
    }

    fn cmp_numeric(a: &[u64], b: &[u64]) -> Ordering {
        for (av, bv) in a.iter().zip(b.iter()) {
            match av.cmp(bv) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.len().cmp(&b.len())
    }
}

pub struct VersionComparator;

impl VersionComparator {
    /// Compare two version tags, `None` when either is not a recognizable version.
    pub fn compare(a: &str, b: &str) -> Option<Ordering> {
        Version::parse(a).compare(&Version::parse(b))
    }

    pub fn is_stable(version: &str) -> bool {
        Version::parse(version).is_stable()
    }
}

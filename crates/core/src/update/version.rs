//! Release tag comparison.
//!
//! Tags look like `v0.1.0-beta.3`. Precedence follows semantic versioning: numeric core segments
//! compare as numbers (missing segments count as zero), a release outranks any of its
//! pre-releases, and pre-release identifiers compare numerically when both are numbers.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    core: Vec<u64>,
    pre: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier {
    Numeric(u64),
    Text(String),
}

impl Version {
    pub fn parse(tag: &str) -> anyhow::Result<Self> {
        let raw = tag.trim();
        let body = raw
            .strip_prefix('v')
            .or_else(|| raw.strip_prefix('V'))
            .unwrap_or(raw);
        // Build metadata never affects precedence.
        let body = body.split('+').next().unwrap_or(body);
        let (core_part, pre_part) = match body.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (body, None),
        };

        anyhow::ensure!(!core_part.is_empty(), "empty version: {tag:?}");
        let core = core_part
            .split('.')
            .map(|seg| {
                seg.parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("invalid version segment {seg:?} in {tag:?}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let pre: Vec<Identifier> = pre_part
            .map(|p| {
                p.split('.')
                    .filter(|s| !s.is_empty())
                    .map(|s| match s.parse::<u64>() {
                        Ok(n) => Identifier::Numeric(n),
                        Err(_) => Identifier::Text(s.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            raw: raw.to_string(),
            core,
            pre,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.core.len().max(other.core.len());
        for i in 0..len {
            let a = self.core.get(i).copied().unwrap_or(0);
            let b = other.core.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_pre(&self.pre, &other.pre),
        }
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

fn compare_pre(a: &[Identifier], b: &[Identifier]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x, y) {
            (Identifier::Numeric(x), Identifier::Numeric(y)) => x.cmp(y),
            (Identifier::Numeric(_), Identifier::Text(_)) => Ordering::Less,
            (Identifier::Text(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Text(x), Identifier::Text(y)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Whether `latest` is a newer release than `current`.
pub fn is_newer(latest: &str, current: &str) -> anyhow::Result<bool> {
    Ok(Version::parse(latest)? > Version::parse(current)?)
}

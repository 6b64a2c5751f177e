//! Runtime version identifiers.
//!
//! Accepts the Java runtime version shapes seen in the wild:
//!
//! - `17.0.2+8-LTS` (`$VNUM(-$PRE)?(+$BUILD)?(-$OPT)?`)
//! - `21-ea+35`
//! - `1.8.0_66` (legacy update suffix, kept as free-form pre-release text)
//! - `1.8.1-blah_whatever$wat`
//!
//! A version must start with a numeric component; further components are
//! separated by dots. An alphanumeric pre-release needs its leading `-`;
//! only legacy suffixes such as `_66` attach directly. A `+` must be
//! followed by a build number or `-$OPT`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CompatError, CompatResult};

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<vnum>[0-9]+(?:\.[0-9]+)*)(?:-(?P<pre>[a-zA-Z0-9][^+\s]*)|(?P<legacy>[^a-zA-Z0-9.+\s-][^+\s]*))?(?:\+(?:(?P<build>[0-9]+)(?:-(?P<opt>\S+))?|-(?P<bare_opt>\S+)))?$",
        )
        .expect("version pattern is valid")
    })
}

fn major_minor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]+\.[0-9]+)").expect("major.minor pattern is valid"))
}

/// Structured runtime version. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionIdentifier {
    components: Vec<u64>,
    pre: Option<String>,
    build: Option<u64>,
    optional: Option<String>,
}

impl VersionIdentifier {
    /// Parse a raw version string.
    pub fn parse(raw: &str) -> CompatResult<Self> {
        let caps = version_pattern()
            .captures(raw)
            .ok_or_else(|| CompatError::malformed(raw))?;

        let components = caps["vnum"]
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| CompatError::malformed(raw))?;

        let build = caps
            .name("build")
            .map(|m| m.as_str().parse::<u64>())
            .transpose()
            .map_err(|_| CompatError::malformed(raw))?;

        Ok(Self {
            components,
            pre: caps
                .name("pre")
                .or_else(|| caps.name("legacy"))
                .map(|m| m.as_str().to_string()),
            build,
            optional: caps
                .name("opt")
                .or_else(|| caps.name("bare_opt"))
                .map(|m| m.as_str().to_string()),
        })
    }

    /// Ordered numeric components. Never empty.
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Pre-release or free-form suffix text (`ea`, `_66`, ...).
    pub fn pre(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    /// Build number following `+`.
    pub fn build(&self) -> Option<u64> {
        self.build
    }

    /// Trailing optional text after the build number (`LTS`, ...).
    pub fn optional(&self) -> Option<&str> {
        self.optional.as_deref()
    }

    /// Runtime feature number.
    ///
    /// Legacy `1.N` versions with `1 <= N <= 9` report `N`; everything else
    /// reports the leading component.
    pub fn feature(&self) -> u64 {
        match self.components.as_slice() {
            [1, n, ..] if (1..=9).contains(n) => *n,
            [first, ..] => *first,
            [] => 0,
        }
    }

    /// Positional ordering of the numeric components. At an equal shared
    /// prefix the sequence with more components is greater.
    pub fn cmp_components(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl FromStr for VersionIdentifier {
    type Err = CompatError;

    fn from_str(s: &str) -> CompatResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
        }
        if let Some(pre) = &self.pre {
            if pre.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                write!(f, "-{}", pre)?;
            } else {
                write!(f, "{}", pre)?;
            }
        }
        if self.build.is_some() || self.optional.is_some() {
            write!(f, "+")?;
        }
        if let Some(build) = self.build {
            write!(f, "{}", build)?;
        }
        if let Some(opt) = &self.optional {
            write!(f, "-{}", opt)?;
        }
        Ok(())
    }
}

/// Leading `major.minor` of a raw version string, e.g. `1.8` for `1.8.0_66`.
pub fn major_minor(raw: &str) -> CompatResult<&str> {
    major_minor_pattern()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| CompatError::malformed(raw))
}

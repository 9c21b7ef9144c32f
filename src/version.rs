//! Semantic version parsing, ordering, and constraint matching.
//!
//! This grammar is a deliberate simplification of full semver: exactly three
//! numeric components, and prerelease ordering compares the suffix
//! byte-lexicographically rather than by semver's dotted-identifier rules.
//! Preserve both simplifications — they are load-bearing for compatibility
//! with the rest of the system, not an oversight.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::InvalidVersion(
                input.to_string(),
                "version string is empty".to_string(),
            ));
        }

        let (core, prerelease) = match input.split_once('-') {
            Some((core, pre)) => {
                if pre.is_empty() {
                    return Err(Error::InvalidVersion(
                        input.to_string(),
                        "prerelease suffix after '-' must not be empty".to_string(),
                    ));
                }
                (core, Some(pre.to_string()))
            }
            None => (input, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidVersion(
                input.to_string(),
                "version must have exactly three dot-separated numeric components".to_string(),
            ));
        }

        let mut nums = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            nums[i] = part.parse::<u64>().map_err(|_| {
                Error::InvalidVersion(
                    input.to_string(),
                    format!("component '{part}' is not a non-negative integer"),
                )
            })?;
        }

        Ok(Version {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            prerelease,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // a release is greater than its own prerelease at the same triple.
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.as_bytes().cmp(b.as_bytes()),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Exact,
    Caret,
    Tilde,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub version: Version,
}

impl Constraint {
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::InvalidConstraint(
                input.to_string(),
                "constraint string is empty".to_string(),
            ));
        }

        let (kind, rest) = if let Some(rest) = input.strip_prefix('^') {
            (ConstraintKind::Caret, rest)
        } else if let Some(rest) = input.strip_prefix('~') {
            (ConstraintKind::Tilde, rest)
        } else {
            (ConstraintKind::Exact, input)
        };

        let version = Version::parse(rest).map_err(|e| {
            Error::InvalidConstraint(input.to_string(), format!("invalid embedded version: {e}"))
        })?;

        Ok(Constraint { kind, version })
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        match self.kind {
            ConstraintKind::Exact => candidate == &self.version,
            ConstraintKind::Caret => {
                candidate.major == self.version.major && candidate >= &self.version
            }
            ConstraintKind::Tilde => {
                candidate.major == self.version.major
                    && candidate.minor == self.version.minor
                    && candidate >= &self.version
            }
        }
    }

    /// Returns the greatest candidate (by `Version`'s ordering) that matches,
    /// or `None` if no candidate matches.
    pub fn find_best_match<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates
            .into_iter()
            .filter(|c| self.matches(c))
            .max()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConstraintKind::Exact => write!(f, "{}", self.version),
            ConstraintKind::Caret => write!(f, "^{}", self.version),
            ConstraintKind::Tilde => write!(f, "~{}", self.version),
        }
    }
}

//! Domain types for branch tracking.
//!
//! Branch names and head ids are opaque strings; they are never parsed, only
//! compared and written out.

use std::fmt;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a remote branch as reported by git, without the `origin/` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName(pub String);

impl BranchName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Commit id a branch currently points at. Used only for change detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeadId(pub String);

impl HeadId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for HeadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HeadId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A branch checked out during enumeration, paired with its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub name: BranchName,
    pub head: HeadId,
}

/// Ordered set of branch names observed in one cycle.
///
/// Order is the enumeration order; it decides which branch becomes the
/// default when the current default disappears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSet(Vec<BranchName>);

impl BranchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `name` unless it is already present.
    pub fn push(&mut self, name: BranchName) {
        if !self.contains(&name) {
            self.0.push(name);
        }
    }

    pub fn contains(&self, name: &BranchName) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn first(&self) -> Option<&BranchName> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BranchName> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[BranchName] {
        &self.0
    }

    /// Branches in `self` that are missing from `current`, in `self` order.
    pub fn removed_in(&self, current: &BranchSet) -> Vec<BranchName> {
        self.0
            .iter()
            .filter(|name| !current.contains(name))
            .cloned()
            .collect()
    }
}

impl FromIterator<BranchName> for BranchSet {
    fn from_iter<I: IntoIterator<Item = BranchName>>(iter: I) -> Self {
        let mut set = BranchSet::new();
        for name in iter {
            set.push(name);
        }
        set
    }
}

impl<'a> IntoIterator for &'a BranchSet {
    type Item = &'a BranchName;
    type IntoIter = std::slice::Iter<'a, BranchName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

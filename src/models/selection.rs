//! Query results grouped by parent unit, and their flattened export rows.

use serde::{Deserialize, Serialize};

/// Separator between unit names in an export row
pub const EXPORT_DELIMITER: &str = ", ";

/// Units of one parent that intersect the merged region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentGroup {
    pub parent: String,
    /// Sorted ascending, duplicate-free
    pub units: Vec<String>,
}

/// Matched unit names grouped by parent.
///
/// Group order follows the first appearance of each parent in the boundary
/// dataset, not the alphabet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionResult {
    groups: Vec<ParentGroup>,
    /// Matched units before name deduplication
    #[serde(skip)]
    matched: usize,
}

impl SelectionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_groups(groups: Vec<ParentGroup>) -> Self {
        let matched = groups.iter().map(|g| g.units.len()).sum();
        Self { groups, matched }
    }

    pub(crate) fn with_matched(mut self, matched: usize) -> Self {
        self.matched = matched;
        self
    }

    pub fn groups(&self) -> &[ParentGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct parents
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Total number of unit names across all groups
    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(|g| g.units.len()).sum()
    }

    /// Number of dataset records that matched, counting units that share a
    /// name separately
    pub fn matched_count(&self) -> usize {
        self.matched
    }

    /// Unit names for a parent, if it has any match
    pub fn units_of(&self, parent: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.parent == parent)
            .map(|g| g.units.as_slice())
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.parent.as_str())
    }
}

/// One export line: a parent and its joined unit names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub parent: String,
    pub units: String,
}

impl ExportRow {
    pub fn from_group(group: &ParentGroup) -> Self {
        Self {
            parent: group.parent.clone(),
            units: group.units.join(EXPORT_DELIMITER),
        }
    }
}

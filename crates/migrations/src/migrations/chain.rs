//! Revision Chain - orders revision units and walks between revisions
//!
//! The chain is validated once at construction: identifiers are unique, there
//! is exactly one root, every predecessor exists and no revision has two
//! successors. After that every walk is a plain pointer chase.

use std::collections::{HashMap, HashSet};

use crate::error::{MigrateResult, MigrationError};

use super::definitions::{RevisionUnit, BASE, HEAD};

/// A validated, linear chain of revisions
#[derive(Debug, Clone, Default)]
pub struct RevisionChain {
    /// Root first, head last
    order: Vec<String>,
    predecessors: HashMap<String, Option<String>>,
}

impl RevisionChain {
    /// Build and validate a chain from unordered units
    pub fn from_units(units: &[RevisionUnit]) -> MigrateResult<Self> {
        let mut predecessors = HashMap::new();
        for unit in units {
            if predecessors
                .insert(unit.id.clone(), unit.down_revision.clone())
                .is_some()
            {
                return Err(MigrationError::Script(format!(
                    "duplicate revision identifier '{}'",
                    unit.id
                )));
            }
        }

        let mut roots = Vec::new();
        let mut successors: HashMap<&str, &str> = HashMap::new();
        for unit in units {
            match unit.down_revision.as_deref() {
                None => roots.push(unit.id.as_str()),
                Some(parent) => {
                    if !predecessors.contains_key(parent) {
                        return Err(MigrationError::Script(format!(
                            "revision '{}' revises unknown revision '{}'",
                            unit.id, parent
                        )));
                    }
                    if let Some(existing) = successors.insert(parent, unit.id.as_str()) {
                        return Err(MigrationError::Script(format!(
                            "revision '{}' has two successors: '{}' and '{}'",
                            parent, existing, unit.id
                        )));
                    }
                }
            }
        }

        if units.is_empty() {
            return Ok(Self::default());
        }

        let root = match roots.as_slice() {
            [root] => *root,
            [] => {
                return Err(MigrationError::Script(
                    "revision chain has no root (cycle)".to_string(),
                ))
            }
            many => {
                return Err(MigrationError::Script(format!(
                    "revision chain has multiple roots: {}",
                    many.join(", ")
                )))
            }
        };

        let mut order = Vec::with_capacity(units.len());
        let mut seen = HashSet::new();
        let mut cursor = Some(root);
        while let Some(id) = cursor {
            if !seen.insert(id) {
                break;
            }
            order.push(id.to_string());
            cursor = successors.get(id).copied();
        }

        if order.len() != units.len() {
            let orphaned: Vec<&str> = units
                .iter()
                .map(|unit| unit.id.as_str())
                .filter(|id| !seen.contains(id))
                .collect();
            return Err(MigrationError::Script(format!(
                "revisions not reachable from root '{}': {}",
                root,
                orphaned.join(", ")
            )));
        }

        Ok(Self {
            order,
            predecessors,
        })
    }

    /// Identifiers from root to head
    pub fn revisions(&self) -> &[String] {
        &self.order
    }

    pub fn root(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// The terminal revision (no successor)
    pub fn head(&self) -> Option<&str> {
        self.order.last().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.predecessors.contains_key(id)
    }

    /// Predecessor of a known revision
    pub fn predecessor(&self, id: &str) -> Option<&str> {
        self.predecessors.get(id).and_then(|p| p.as_deref())
    }

    /// Resolve `head` to the terminal revision. Any other target is returned
    /// unchanged; it is checked when a path is computed.
    pub fn resolve_target(&self, target: &str) -> MigrateResult<String> {
        if target == HEAD {
            return self.head().map(str::to_string).ok_or_else(|| {
                MigrationError::RevisionResolution(
                    "cannot resolve 'head': no revisions defined".to_string(),
                )
            });
        }
        Ok(target.to_string())
    }

    /// Revisions to apply, oldest first, to move from `current` to `target`.
    ///
    /// Walks back from `target` through predecessors until `current` (or past
    /// the root when `current` is `None`). Fails if either revision is unknown
    /// or `target` does not descend from `current`.
    pub fn compute_path(&self, current: Option<&str>, target: &str) -> MigrateResult<Vec<String>> {
        if current == Some(target) {
            return Ok(Vec::new());
        }

        if target == BASE {
            return match current {
                None => Ok(Vec::new()),
                Some(current) => Err(MigrationError::RevisionResolution(format!(
                    "target 'base' is behind current revision '{}'; use a downgrade",
                    current
                ))),
            };
        }

        self.ensure_known(target, "target")?;
        if let Some(current) = current {
            self.ensure_known(current, "current")?;
        }

        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(id) = cursor {
            if Some(id) == current {
                break;
            }
            path.push(id.to_string());
            cursor = self.predecessor(id);
        }

        if let (Some(current), None) = (current, cursor) {
            return Err(MigrationError::RevisionResolution(format!(
                "target '{}' does not descend from current revision '{}'",
                target, current
            )));
        }

        path.reverse();
        Ok(path)
    }

    /// Revisions to revert, newest first, to move from `current` back to
    /// `target` (`base` reverts everything).
    pub fn downgrade_path(&self, current: Option<&str>, target: &str) -> MigrateResult<Vec<String>> {
        let Some(current) = current else {
            return if target == BASE {
                Ok(Vec::new())
            } else {
                Err(MigrationError::RevisionResolution(format!(
                    "cannot downgrade to '{}': no revision is applied",
                    target
                )))
            };
        };

        if current == target {
            return Ok(Vec::new());
        }

        self.ensure_known(current, "current")?;
        let stop = if target == BASE {
            None
        } else {
            self.ensure_known(target, "target")?;
            Some(target)
        };

        let mut path = Vec::new();
        let mut cursor = Some(current);
        while let Some(id) = cursor {
            if Some(id) == stop {
                break;
            }
            path.push(id.to_string());
            cursor = self.predecessor(id);
        }

        if stop.is_some() && cursor.is_none() {
            return Err(MigrationError::RevisionResolution(format!(
                "target '{}' is not an ancestor of current revision '{}'",
                target, current
            )));
        }

        Ok(path)
    }

    fn ensure_known(&self, id: &str, role: &str) -> MigrateResult<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(MigrationError::RevisionResolution(format!(
                "unknown {} revision '{}'",
                role, id
            )))
        }
    }
}

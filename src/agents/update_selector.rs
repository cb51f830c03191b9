use crate::agents::manifest_parser::ParsedManifest;
use crate::agents::module_record::ModuleRecord;
use crate::error::{DmmError, Result};
use crate::registry::VersionComparator;
use std::cmp::Ordering;
use std::collections::HashSet;

/// How the latest version relates to the imported one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Upgrade,
    Downgrade,
    /// The tags differ but are not comparable versions.
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCandidate {
    pub record: ModuleRecord,
    pub latest_version: String,
    pub kind: UpdateKind,
    pub stable: bool,
}

/// Resolved records split by whether the manifest lags behind.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub current: Vec<ModuleRecord>,
    pub updatable: Vec<UpdateCandidate>,
}

impl Selection {
    pub fn is_up_to_date(&self) -> bool {
        self.updatable.is_empty()
    }

    pub fn updatable_records(&self) -> Vec<ModuleRecord> {
        self.updatable.iter().map(|c| c.record.clone()).collect()
    }
}

pub struct UpdateSelector;

impl UpdateSelector {
    /// Partition records; ones that were never resolved land in neither set.
    pub fn select(records: &[ModuleRecord]) -> Selection {
        let mut selection = Selection::default();

        for record in records {
            let Some(latest) = record.latest_version.as_deref() else {
                continue;
            };

            if !record.is_outdated() {
                selection.current.push(record.clone());
                continue;
            }

            let kind = match VersionComparator::compare(latest, &record.imported_version) {
                Some(Ordering::Greater) => UpdateKind::Upgrade,
                Some(Ordering::Less) => UpdateKind::Downgrade,
                _ => UpdateKind::Changed,
            };

            selection.updatable.push(UpdateCandidate {
                record: record.clone(),
                latest_version: latest.to_string(),
                kind,
                stable: VersionComparator::is_stable(latest),
            });
        }

        selection
    }

    /// Fail when a non-empty filter left nothing to work on. Returns the requested
    /// names that matched no record.
    pub fn ensure_matches(requested: &[String], parsed: &ParsedManifest) -> Result<Vec<String>> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        if parsed.records.is_empty() {
            return Err(DmmError::NoMatchingModules {
                requested: requested.to_vec(),
            });
        }

        let declared: HashSet<&str> = parsed.records.iter().map(|r| r.name.as_str()).collect();
        Ok(requested
            .iter()
            .filter(|name| !declared.contains(name.as_str()))
            .cloned()
            .collect())
    }
}

//! Revision reconciliation.
//!
//! Applied records are first checked against the files they came from,
//! then the files on disk are classified against the applied set to
//! produce an ordered [`Plan`] of revisions to apply.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, info, warn};

use crate::error::{MigrationError, Result};
use crate::revision::{
    FileRevision, NormalizedChecksums, RevisionParser, StoredRevision, VersionId, compute_checksum,
};
use crate::store::RevisionStore;

/// Applied revisions keyed by version
pub type AppliedRevisions = BTreeMap<VersionId, StoredRevision>;

/// Missing version range between the current version and the first new revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub current: VersionId,
    pub next: VersionId,
}

/// Revisions to apply, ascending by version
#[derive(Debug, Clone)]
pub struct Plan {
    pub current_version: VersionId,
    pub target_version: VersionId,
    pub revisions: Vec<FileRevision>,
    pub applied_count: usize,
    pub gap: Option<Gap>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn versions(&self) -> Vec<VersionId> {
        self.revisions.iter().map(|r| r.version_id).collect()
    }
}

/// Check every applied record against the file it was applied from.
///
/// Fails on the first record whose file is gone or whose content no
/// longer hashes to the recorded checksum under any line-ending form.
pub fn verify_applied(dir: &Path, stored: Vec<StoredRevision>) -> Result<AppliedRevisions> {
    let mut applied = AppliedRevisions::new();

    for revision in stored {
        let path = dir.join(&revision.file_name);
        if !is_plain_file_name(&revision.file_name) || !path.is_file() {
            return Err(MigrationError::MissingRevisionFile {
                version: revision.version_id,
                file: revision.file_name,
            });
        }

        let file_checksum = compute_checksum(&path)?;
        if file_checksum != revision.checksum {
            let bytes = fs::read(&path).map_err(|e| MigrationError::io(&path, e))?;
            let normalized = NormalizedChecksums::from_content(&bytes);
            if !normalized.contains(&revision.checksum) {
                return Err(MigrationError::ChecksumMismatch {
                    version: revision.version_id,
                    file: revision.file_name.clone(),
                    stored_file: revision.file_name,
                    stored_checksum: revision.checksum,
                    file_checksum,
                });
            }
            debug!(
                "Revision {} differs from its record only in line endings",
                revision.version_id
            );
        }

        applied.insert(revision.version_id, revision);
    }

    Ok(applied)
}

/// Recorded file names must name an entry directly inside the revisions
/// directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Classify `candidates` against `applied` and order the new ones.
///
/// `base_version` raises the starting watermark: revisions at or below it
/// are treated as already present.
pub fn reconcile(
    applied: &AppliedRevisions,
    candidates: Vec<FileRevision>,
    base_version: VersionId,
) -> Result<Plan> {
    let mut current_version = applied.keys().next_back().copied().unwrap_or(0);
    if current_version < base_version {
        info!("Migration will be started at version {}", base_version);
        current_version = base_version;
    }

    let mut new_revisions: BTreeMap<VersionId, FileRevision> = BTreeMap::new();
    for candidate in candidates {
        let version = candidate.version_id;

        if let Some(stored) = applied.get(&version) {
            if !candidate.matches(stored) {
                return Err(MigrationError::ChecksumMismatch {
                    version,
                    stored_file: stored.file_name.clone(),
                    stored_checksum: stored.checksum.clone(),
                    file: candidate.file_name,
                    file_checksum: candidate.checksum,
                });
            }
            continue;
        }

        if version <= current_version {
            debug!(
                "Ignoring revision {} ({}), at or below version {}",
                version, candidate.file_name, current_version
            );
            continue;
        }

        match new_revisions.entry(version) {
            Entry::Occupied(existing) => {
                return Err(MigrationError::DuplicateVersion {
                    version,
                    existing: existing.get().to_string(),
                    duplicate: candidate.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
        }
    }

    let revisions: Vec<FileRevision> = new_revisions.into_values().collect();

    let gap = match revisions.first() {
        Some(first) if first.version_id > current_version.saturating_add(1) => {
            warn!(
                "Versions might be missing: {} jumps to {}",
                current_version, first.version_id
            );
            Some(Gap {
                current: current_version,
                next: first.version_id,
            })
        }
        _ => None,
    };

    let target_version = revisions
        .last()
        .map(|r| r.version_id)
        .unwrap_or(current_version);

    Ok(Plan {
        current_version,
        target_version,
        revisions,
        applied_count: applied.len(),
        gap,
    })
}

/// Runs the three reconciliation stages for one revisions directory
pub struct ReconciliationEngine<'a> {
    dir: &'a Path,
    parser: &'a RevisionParser,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(dir: &'a Path, parser: &'a RevisionParser) -> Self {
        Self { dir, parser }
    }

    pub fn plan(&self, store: &mut RevisionStore<'_>, base_version: VersionId) -> Result<Plan> {
        info!("Loading applied revisions...");
        store.ensure_table()?;
        let applied = verify_applied(self.dir, store.load_applied()?)?;
        info!("Total revisions loaded: {}", applied.len());

        info!("Loading new revisions from {}", self.dir.display());
        let candidates = self.parser.scan(self.dir)?;
        let plan = reconcile(&applied, candidates, base_version)?;

        info!("DB currently at version: {}", plan.current_version);
        info!("Loaded {} new revision(s)", plan.revisions.len());
        info!("Target schema version: {}", plan.target_version);
        Ok(plan)
    }
}

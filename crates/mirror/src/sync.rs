use crate::{SyncError, TimePolicy};
use multiworld_kernel::EngineInstance;
use multiworld_state::{Snapshot, diff, merge, normalize_all};

/// What one synchronization changed in the mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub deleted: usize,
    pub updated: usize,
    /// New entities whose target pose was re-asserted after apply.
    pub reasserted: usize,
}

/// Bring `mirror` into the state described by `target`.
///
/// The mirror is paused for the whole operation and its original pause flag
/// is restored on success. On error it is left paused.
pub fn sync_to(
    mirror: &mut dyn EngineInstance,
    target: &Snapshot,
    policy: TimePolicy,
) -> Result<SyncReport, SyncError> {
    let span = tracing::info_span!("sync", mirror = mirror.name(), target = %target.world);
    let _guard = span.enter();

    let was_paused = mirror.is_paused();
    mirror.set_paused(true);

    let current = mirror.capture_snapshot();
    let delta = diff(&current, target);
    let mut merged = merge(&current, &delta);
    if policy == TimePolicy::UseTarget {
        merged.time = target.time;
    }
    normalize_all(&mut merged.insertions);
    normalize_all(&mut merged.deletions);

    let new_in_target = target.entities_missing_from(&current);

    mirror.apply_snapshot(&merged)?;

    for wanted in &new_in_target {
        if mirror.entity(&wanted.name).is_none() {
            tracing::error!(entity = %wanted.name, "inserted entity missing after apply");
            return Err(SyncError::MissingAfterApply {
                name: wanted.name.clone(),
            });
        }
        mirror.set_entity_state(wanted)?;
    }

    mirror.set_paused(was_paused);

    let report = SyncReport {
        inserted: delta.inserted.len(),
        deleted: delta.deleted.len(),
        updated: delta.updated.len(),
        reasserted: new_in_target.len(),
    };
    tracing::debug!(?report, "mirror synchronized");
    Ok(report)
}

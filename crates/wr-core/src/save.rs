use crate::error::{CoreResult, save_failure};
use crate::item::WorkItemId;
use crate::observer::EngineObserver;
use crate::store::Session;

/// What the save phase did, ids in load order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub saved: Vec<WorkItemId>,
    pub skipped: Vec<WorkItemId>,
}

/// Persist every dirty record in the session, in load order.
///
/// Invalid dirty records are skipped, the rest still save. A store failure
/// aborts mid-way; records already committed stay committed.
pub fn save_dirty(
    session: &mut Session<'_>,
    observer: &dyn EngineObserver,
) -> CoreResult<SaveReport> {
    let mut report = SaveReport::default();
    for index in 0..session.loaded_len() {
        if !session.item(index).is_dirty() {
            continue;
        }
        let valid = session.item(index).is_valid();
        observer.saving(session.item(index), valid);
        if !valid {
            report.skipped.push(session.item(index).id);
            continue;
        }
        session.item_mut(index).partial_open();
        session.commit_at(index).map_err(save_failure)?;
        report.saved.push(session.item(index).id);
    }
    Ok(report)
}

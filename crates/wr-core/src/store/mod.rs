use crate::error::StoreError;
use crate::item::{WorkItem, WorkItemId};

mod memory;

pub use memory::MemoryStore;

/// Backing repository of work items.
///
/// `fetch` hands out a detached copy; `commit` writes one back. Stores hold
/// no per-invocation state, that lives in the [`Session`].
pub trait WorkItemStore: Send + Sync {
    fn fetch(&self, id: WorkItemId) -> Result<WorkItem, StoreError>;
    fn commit(&self, item: &WorkItem) -> Result<(), StoreError>;
}

/// The working copies one `process_event` invocation has touched.
///
/// A record is fetched once and cached; every later lookup returns the same
/// copy, so rules see each other's changes. The save phase walks the copies
/// in load order. A session never outlives its invocation.
pub struct Session<'s> {
    store: &'s dyn WorkItemStore,
    loaded: Vec<WorkItem>,
}

impl<'s> Session<'s> {
    pub fn new(store: &'s dyn WorkItemStore) -> Self {
        Self {
            store,
            loaded: Vec::new(),
        }
    }

    /// Fetch a record, caching the working copy on first use.
    pub fn get(&mut self, id: WorkItemId) -> Result<&mut WorkItem, StoreError> {
        if let Some(pos) = self.loaded.iter().position(|w| w.id == id) {
            return Ok(&mut self.loaded[pos]);
        }
        let item = self.store.fetch(id)?;
        let pos = self.loaded.len();
        self.loaded.push(item);
        Ok(&mut self.loaded[pos])
    }

    pub fn loaded_len(&self) -> usize {
        self.loaded.len()
    }

    /// Working copy by load position.
    pub fn item(&self, index: usize) -> &WorkItem {
        &self.loaded[index]
    }

    pub fn item_mut(&mut self, index: usize) -> &mut WorkItem {
        &mut self.loaded[index]
    }

    /// Commit the copy at `index` and mark it clean.
    ///
    /// The record must have been opened first; committing an unopened record
    /// is a protocol violation, not a store failure.
    pub fn commit_at(&mut self, index: usize) -> Result<(), StoreError> {
        let item = &self.loaded[index];
        if !item.is_open() {
            return Err(StoreError::SaveProtocol(item.id));
        }
        self.store.commit(item)?;
        self.loaded[index].mark_clean();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::FieldValue;

    fn store_with(ids: &[u64]) -> MemoryStore {
        let store = MemoryStore::new();
        for id in ids {
            let mut item = WorkItem::new(WorkItemId(*id), "task", "website");
            item.set_field("title", FieldValue::Str(format!("Item {id}")));
            item.set_field("estimate", FieldValue::Number(3.0));
            store.insert(item);
        }
        store
    }

    #[test]
    fn get_caches_the_first_fetch() {
        let store = store_with(&[1]);
        let mut session = Session::new(&store);

        session
            .get(WorkItemId(1))
            .unwrap()
            .set_field("estimate", FieldValue::Number(9.0));

        let again = session.get(WorkItemId(1)).unwrap();
        assert_eq!(again.field("estimate"), Some(&FieldValue::Number(9.0)));
        assert_eq!(session.loaded_len(), 1);

        // The store itself is untouched until a commit.
        assert_eq!(
            store.snapshot(WorkItemId(1)).unwrap().field("estimate"),
            Some(&FieldValue::Number(3.0))
        );
    }

    #[test]
    fn load_order_is_preserved() {
        let store = store_with(&[1, 2, 3]);
        let mut session = Session::new(&store);
        session.get(WorkItemId(2)).unwrap();
        session.get(WorkItemId(1)).unwrap();
        session.get(WorkItemId(2)).unwrap();
        session.get(WorkItemId(3)).unwrap();

        let order: Vec<u64> = (0..session.loaded_len())
            .map(|i| session.item(i).id.0)
            .collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn missing_item_is_not_found() {
        let store = store_with(&[1]);
        let mut session = Session::new(&store);
        assert_eq!(
            session.get(WorkItemId(9)).unwrap_err(),
            StoreError::NotFound(WorkItemId(9))
        );
        assert_eq!(session.loaded_len(), 0);
    }

    #[test]
    fn commit_requires_an_opened_record() {
        let store = store_with(&[1]);
        let mut session = Session::new(&store);
        session
            .get(WorkItemId(1))
            .unwrap()
            .set_field("estimate", FieldValue::Number(4.0));

        assert_eq!(
            session.commit_at(0).unwrap_err(),
            StoreError::SaveProtocol(WorkItemId(1))
        );

        session.item_mut(0).partial_open();
        session.commit_at(0).unwrap();
        assert!(!session.item(0).is_dirty());
        assert!(!session.item(0).is_open());
        assert_eq!(
            store.snapshot(WorkItemId(1)).unwrap().field("estimate"),
            Some(&FieldValue::Number(4.0))
        );
    }
}

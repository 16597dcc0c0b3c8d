// ABOUTME: In-memory holder of the working OpenAPI document with typed, idempotent mutations.
// ABOUTME: Tracks a revision counter so callers can tell whether the document changed since a save.

use serde_json::Value;
use thiserror::Error;

use crate::document::{ComponentKind, Document, HttpMethod, Info, Operation, PathItem, Server, Tag};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document is not loaded")]
    NotLoaded,
}

/// What a mutation did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A value was inserted or replaced.
    Upserted,
    /// An existing entry was deleted.
    Removed,
    /// A delete targeted an entry that did not exist.
    Unchanged,
}

/// The working copy of one conversation's document.
///
/// Mutations fail with [`StoreError::NotLoaded`] until a document is loaded.
/// Every mutation that changes the document bumps the revision.
#[derive(Debug, Default)]
pub struct DocumentStore {
    document: Option<Document>,
    revision: u64,
}

impl DocumentStore {
    /// An empty store. Every operation fails until [`DocumentStore::load`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `document` at revision zero.
    pub fn loaded(document: Document) -> Self {
        Self {
            document: Some(document),
            revision: 0,
        }
    }

    /// Install the document read from persistence. Resets the revision.
    pub fn load(&mut self, document: Document) {
        self.document = Some(document);
        self.revision = 0;
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn get(&self) -> Result<&Document, StoreError> {
        self.document.as_ref().ok_or(StoreError::NotLoaded)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn edit(&mut self) -> Result<&mut Document, StoreError> {
        let doc = self.document.as_mut().ok_or(StoreError::NotLoaded)?;
        self.revision += 1;
        Ok(doc)
    }

    pub fn upsert_component(
        &mut self,
        kind: ComponentKind,
        name: &str,
        value: Value,
    ) -> Result<Change, StoreError> {
        let doc = self.edit()?;
        doc.components
            .collection_mut(kind)
            .insert(name.to_string(), value);
        Ok(Change::Upserted)
    }

    pub fn remove_component(&mut self, kind: ComponentKind, name: &str) -> Result<Change, StoreError> {
        let exists = self.get()?.components.collection(kind).contains_key(name);
        if !exists {
            return Ok(Change::Unchanged);
        }
        self.edit()?.components.collection_mut(kind).remove(name);
        Ok(Change::Removed)
    }

    /// Insert or replace the operation at `path` + `method`, creating the path item if needed.
    pub fn upsert_operation(
        &mut self,
        path: &str,
        method: HttpMethod,
        operation: Operation,
    ) -> Result<Change, StoreError> {
        let doc = self.edit()?;
        doc.paths
            .entry(path.to_string())
            .or_insert_with(PathItem::default)
            .operations
            .insert(method, operation);
        Ok(Change::Upserted)
    }

    /// Delete the operation at `path` + `method`. A path item left with no
    /// operations is removed too.
    pub fn remove_operation(&mut self, path: &str, method: HttpMethod) -> Result<Change, StoreError> {
        if self.get()?.operation(path, method).is_none() {
            return Ok(Change::Unchanged);
        }
        let doc = self.edit()?;
        if let Some(item) = doc.paths.get_mut(path) {
            item.operations.remove(&method);
            if item.has_no_operations() {
                doc.paths.remove(path);
            }
        }
        Ok(Change::Removed)
    }

    pub fn set_info(&mut self, info: Info) -> Result<Change, StoreError> {
        self.edit()?.info = info;
        Ok(Change::Upserted)
    }

    pub fn set_servers(&mut self, servers: Vec<Server>) -> Result<Change, StoreError> {
        self.edit()?.servers = servers;
        Ok(Change::Upserted)
    }

    pub fn set_tags(&mut self, tags: Vec<Tag>) -> Result<Change, StoreError> {
        self.edit()?.tags = tags;
        Ok(Change::Upserted)
    }

    /// Replace the whole document with `document`.
    pub fn replace(&mut self, document: Document) -> Result<Change, StoreError> {
        *self.edit()? = document;
        Ok(Change::Upserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(id: &str) -> Operation {
        Operation {
            operation_id: id.to_string(),
            tags: vec!["users".to_string()],
            summary: "s".to_string(),
            description: "d".to_string(),
            ..Operation::default()
        }
    }

    #[test]
    fn unloaded_store_rejects_everything() {
        let mut store = DocumentStore::new();
        assert_eq!(store.get().unwrap_err(), StoreError::NotLoaded);
        assert_eq!(
            store
                .upsert_component(ComponentKind::Schemas, "User", json!({}))
                .unwrap_err(),
            StoreError::NotLoaded
        );
        assert_eq!(
            store.remove_operation("/x", HttpMethod::Get).unwrap_err(),
            StoreError::NotLoaded
        );
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn component_upsert_is_idempotent() {
        let mut store = DocumentStore::loaded(Document::default());
        let body = json!({ "type": "object" });
        store
            .upsert_component(ComponentKind::Schemas, "User", body.clone())
            .unwrap();
        let once = store.get().unwrap().clone();
        store
            .upsert_component(ComponentKind::Schemas, "User", body)
            .unwrap();
        assert_eq!(store.get().unwrap(), &once);
        assert_eq!(once.components.schemas.len(), 1);
    }

    #[test]
    fn removing_last_operation_prunes_path() {
        let mut store = DocumentStore::loaded(Document::default());
        store
            .upsert_operation("/users", HttpMethod::Get, op("listUsers"))
            .unwrap();
        store
            .upsert_operation("/users", HttpMethod::Post, op("createUser"))
            .unwrap();

        assert_eq!(
            store.remove_operation("/users", HttpMethod::Get).unwrap(),
            Change::Removed
        );
        let doc = store.get().unwrap();
        assert!(doc.operation("/users", HttpMethod::Get).is_none());
        assert_eq!(
            doc.operation("/users", HttpMethod::Post),
            Some(&op("createUser"))
        );

        store.remove_operation("/users", HttpMethod::Post).unwrap();
        assert!(store.get().unwrap().paths.is_empty());
    }

    enum Step {
        Upsert(&'static str),
        Remove,
    }

    fn apply_component(store: &mut DocumentStore, step: &Step) {
        match step {
            Step::Upsert(ty) => store
                .upsert_component(ComponentKind::Schemas, "User", json!({ "type": ty }))
                .unwrap(),
            Step::Remove => store.remove_component(ComponentKind::Schemas, "User").unwrap(),
        };
    }

    fn apply_operation(store: &mut DocumentStore, step: &Step) {
        match step {
            Step::Upsert(id) => store
                .upsert_operation("/users", HttpMethod::Get, op(id))
                .unwrap(),
            Step::Remove => store.remove_operation("/users", HttpMethod::Get).unwrap(),
        };
    }

    #[test]
    fn last_write_decides_a_named_entry() {
        let sequences = [
            [Step::Upsert("object"), Step::Remove, Step::Upsert("string")],
            [Step::Remove, Step::Upsert("object"), Step::Remove],
        ];
        for steps in &sequences {
            let last = &steps[steps.len() - 1];

            let mut replayed = DocumentStore::loaded(Document::default());
            let mut only_last = DocumentStore::loaded(Document::default());
            for step in steps {
                apply_component(&mut replayed, step);
                apply_operation(&mut replayed, step);
            }
            apply_component(&mut only_last, last);
            apply_operation(&mut only_last, last);

            assert_eq!(replayed.get().unwrap(), only_last.get().unwrap());
        }
    }

    #[test]
    fn disjoint_names_commute() {
        let mut forward = DocumentStore::loaded(Document::default());
        forward
            .upsert_component(ComponentKind::Schemas, "User", json!({ "type": "object" }))
            .unwrap();
        forward
            .upsert_component(ComponentKind::Schemas, "Pet", json!({ "type": "string" }))
            .unwrap();
        forward
            .upsert_operation("/users", HttpMethod::Get, op("listUsers"))
            .unwrap();
        forward
            .upsert_operation("/pets", HttpMethod::Post, op("createPet"))
            .unwrap();

        let mut backward = DocumentStore::loaded(Document::default());
        backward
            .upsert_operation("/pets", HttpMethod::Post, op("createPet"))
            .unwrap();
        backward
            .upsert_operation("/users", HttpMethod::Get, op("listUsers"))
            .unwrap();
        backward
            .upsert_component(ComponentKind::Schemas, "Pet", json!({ "type": "string" }))
            .unwrap();
        backward
            .upsert_component(ComponentKind::Schemas, "User", json!({ "type": "object" }))
            .unwrap();

        assert_eq!(forward.get().unwrap(), backward.get().unwrap());
    }

    #[test]
    fn removing_missing_entries_leaves_revision_alone() {
        let mut store = DocumentStore::loaded(Document::default());
        assert_eq!(
            store.remove_component(ComponentKind::Headers, "X-Rate").unwrap(),
            Change::Unchanged
        );
        assert_eq!(
            store.remove_operation("/nope", HttpMethod::Delete).unwrap(),
            Change::Unchanged
        );
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn mutations_bump_revision_and_load_resets_it() {
        let mut store = DocumentStore::loaded(Document::default());
        store.set_tags(vec![Tag { name: "users".into(), description: None }]).unwrap();
        store.set_servers(Vec::new()).unwrap();
        assert_eq!(store.revision(), 2);

        store.load(Document::default());
        assert_eq!(store.revision(), 0);
        assert!(store.get().unwrap().tags.is_empty());
    }

    #[test]
    fn replace_swaps_whole_document() {
        let mut store = DocumentStore::loaded(Document::default());
        let mut next = Document::default();
        next.info.title = "Pets".to_string();
        store.replace(next.clone()).unwrap();
        assert_eq!(store.get().unwrap(), &next);
    }
}

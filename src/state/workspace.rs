use super::content_store::ContentStore;
use super::tab_bars::TabBarRegistry;
use crate::error::DocumentError;

/// Explicit context object owning the document store and the tab bars.
///
/// All structural operations go through here so that a store entry lives
/// exactly as long as some tab bar references its id.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    store: ContentStore,
    tabs: TabBarRegistry,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn tabs(&self) -> &TabBarRegistry {
        &self.tabs
    }

    /// Opens the document in a bar and reserves its store entry. Returns true
    /// when no bar referenced the document before (it needs seeding).
    pub fn open_document(
        &mut self,
        tab_bar_id: &str,
        document_id: &str,
    ) -> Result<bool, DocumentError> {
        let first_reference = !self.tabs.references(document_id);
        self.tabs.open(tab_bar_id, document_id)?;
        self.store.reserve(document_id);
        Ok(first_reference)
    }

    pub fn seed(&mut self, document_id: &str, content: &str) -> bool {
        if !self.store.contains(document_id) {
            return false;
        }
        self.store.seed(document_id, content)
    }

    pub fn edit(&mut self, document_id: &str, content: &str) -> Result<(), DocumentError> {
        self.store.set_current(document_id, content)
    }

    pub fn commit(&mut self, document_id: &str) -> Result<(), DocumentError> {
        self.store.commit(document_id)
    }

    pub fn revert(&mut self, document_id: &str) -> Result<(), DocumentError> {
        self.store.revert(document_id)
    }

    pub fn is_dirty(&self, document_id: &str) -> bool {
        self.store.is_dirty(document_id)
    }

    pub fn current(&self, document_id: &str) -> Option<&str> {
        self.store.current(document_id)
    }

    pub fn baseline(&self, document_id: &str) -> Option<&str> {
        self.store.baseline(document_id)
    }

    /// Closes one tab; the store entry goes only when no bar lists the id.
    /// Returns true when the document left the store.
    pub fn close_tab(&mut self, tab_bar_id: &str, document_id: &str) -> Result<bool, DocumentError> {
        self.tabs.close(tab_bar_id, document_id)?;
        if self.tabs.references(document_id) {
            return Ok(false);
        }
        Ok(self.store.remove(document_id))
    }

    /// Closes the document in every bar and drops its content.
    pub fn close_everywhere(&mut self, document_id: &str) -> bool {
        for tab_bar_id in self.tabs.bars_containing(document_id) {
            let _ = self.tabs.close(&tab_bar_id, document_id);
        }
        self.store.remove(document_id)
    }

    pub fn activate(&mut self, tab_bar_id: &str, document_id: &str) -> Result<(), DocumentError> {
        self.tabs.activate(tab_bar_id, document_id)
    }

    pub fn focus(&mut self, tab_bar_id: &str) -> Result<(), DocumentError> {
        self.tabs.focus(tab_bar_id)
    }

    pub fn split_pane(
        &mut self,
        source_tab_bar_id: &str,
        document_id: &str,
    ) -> Result<String, DocumentError> {
        self.tabs.split(source_tab_bar_id, document_id)
    }

    pub fn reorder(
        &mut self,
        tab_bar_id: &str,
        from_index: usize,
        to_index: usize,
    ) -> Result<(), DocumentError> {
        self.tabs.reorder(tab_bar_id, from_index, to_index)
    }

    /// Renames a document across every bar and the store in one step. All
    /// checks run before anything is touched.
    pub fn rename_document(&mut self, old_id: &str, new_id: &str) -> Result<(), DocumentError> {
        if old_id == new_id {
            return Ok(());
        }
        let in_store = self.store.contains(old_id);
        if !in_store && !self.tabs.references(old_id) {
            return Err(DocumentError::UnknownDocument(old_id.to_string()));
        }
        if in_store && self.store.contains(new_id) {
            return Err(DocumentError::AlreadyExists(new_id.to_string()));
        }

        if in_store {
            self.store.rename(old_id, new_id)?;
        }
        self.tabs.rename_document_id(old_id, new_id);
        Ok(())
    }

    /// Both structural invariants: every bar is well formed and store entries
    /// exist exactly for referenced ids.
    pub fn invariants_hold(&self) -> bool {
        self.tabs.invariants_hold()
            && self.store.ids().all(|id| self.tabs.references(id))
            && self
                .tabs
                .bars()
                .iter()
                .flat_map(|bar| bar.document_ids())
                .all(|id| self.store.contains(id))
    }
}

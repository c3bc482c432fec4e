use super::{ConversationManager, SessionUpdate};
use crate::error::DocumentError;
use crate::tool_preview::DiffView;
use anyhow::{Context, Result};

impl ConversationManager {
    /// Opens a document in the active tab bar, fetching its content the first
    /// time any bar references it.
    pub async fn open_document(&mut self, document_id: &str) -> Result<()> {
        let tab_bar_id = self.workspace.tabs().active_tab_bar_id().to_string();
        self.open_document_in(&tab_bar_id, document_id).await
    }

    pub async fn open_document_in(&mut self, tab_bar_id: &str, document_id: &str) -> Result<()> {
        let first_reference = self.workspace.open_document(tab_bar_id, document_id)?;
        if !first_reference && self.workspace.store().is_loaded(document_id) {
            return Ok(());
        }

        match self.documents.fetch(document_id).await {
            Ok(content) => {
                self.workspace
                    .seed(document_id, content.as_deref().unwrap_or_default());
                Ok(())
            }
            Err(error) => {
                // Leave no loading entry behind.
                let _ = self.workspace.close_tab(tab_bar_id, document_id);
                Err(error.context(format!("Failed to open {document_id}")))
            }
        }
    }

    /// Local keystrokes: only `current` moves.
    pub fn edit_document(&mut self, document_id: &str, content: &str) -> Result<(), DocumentError> {
        self.workspace.edit(document_id, content)
    }

    /// Persists `current`, then makes it the new baseline.
    pub async fn save_document(&mut self, document_id: &str) -> Result<()> {
        let content = self
            .workspace
            .current(document_id)
            .map(str::to_string)
            .ok_or_else(|| DocumentError::NotLoaded(document_id.to_string()))?;
        self.documents
            .save(document_id, &content)
            .await
            .with_context(|| format!("Failed to save {document_id}"))?;
        self.workspace.commit(document_id)?;
        tracing::debug!(document_id, bytes = content.len(), "document saved");
        Ok(())
    }

    pub fn split_pane(&mut self, tab_bar_id: &str, document_id: &str) -> Result<String, DocumentError> {
        self.workspace.split_pane(tab_bar_id, document_id)
    }

    /// Closes one tab. When that was the last reference, a preview on the
    /// document is dropped along with its content.
    pub fn close_tab(&mut self, tab_bar_id: &str, document_id: &str) -> Result<bool, DocumentError> {
        let removed = self.workspace.close_tab(tab_bar_id, document_id)?;
        if removed && self.previews.discard(&mut self.workspace, document_id).is_some() {
            self.emit(SessionUpdate::PreviewCleared {
                document_id: document_id.to_string(),
                committed: false,
            });
        }
        Ok(removed)
    }

    pub fn activate_tab(&mut self, tab_bar_id: &str, document_id: &str) -> Result<(), DocumentError> {
        self.workspace.activate(tab_bar_id, document_id)
    }

    pub fn focus_tab_bar(&mut self, tab_bar_id: &str) -> Result<(), DocumentError> {
        self.workspace.focus(tab_bar_id)
    }

    pub fn reorder_tab(
        &mut self,
        tab_bar_id: &str,
        from_index: usize,
        to_index: usize,
    ) -> Result<(), DocumentError> {
        self.workspace.reorder(tab_bar_id, from_index, to_index)
    }

    pub fn rename_document(&mut self, old_id: &str, new_id: &str) -> Result<(), DocumentError> {
        self.workspace.rename_document(old_id, new_id)?;
        self.previews.rename(old_id, new_id);
        Ok(())
    }

    pub fn is_dirty(&self, document_id: &str) -> bool {
        self.workspace.is_dirty(document_id)
    }

    pub fn diff_view(&self, document_id: &str) -> Option<DiffView> {
        self.previews.diff_view(document_id)
    }
}

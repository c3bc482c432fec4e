use crate::edit_diff::{diff_hunks, DiffHunk};
use crate::error::PreviewError;
use crate::state::Workspace;
use crate::tools::edits::FileEdit;
use crate::util::has_managed_extension;
use std::collections::HashMap;

/// One tool call's contribution to a document preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLayer {
    /// Stable identity of the call within the stream, known before its id.
    pub call_key: String,
    pub tool_call_id: Option<String>,
    pub tool_name: String,
    pub edit: FileEdit,
    /// Content this call applies to: the previous layer's result.
    pub base: String,
    /// `None` is a whole-file delete.
    pub proposed: Option<String>,
    pub warnings: Vec<String>,
}

impl PreviewLayer {
    fn shown(&self) -> &str {
        self.proposed.as_deref().unwrap_or(&self.base)
    }
}

/// Proposed agent edits currently shown in place of the document's content,
/// stacked in the order their calls streamed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPreview {
    pub document_id: String,
    /// Live content before any unconfirmed call touched it; restored on reject.
    pub original: String,
    /// Tab bar the document was opened in only to show this preview.
    pub opened_in: Option<String>,
    pub layers: Vec<PreviewLayer>,
}

impl StagedPreview {
    fn new(document_id: &str, original: &str, opened_in: Option<&str>) -> Self {
        Self {
            document_id: document_id.to_string(),
            original: original.to_string(),
            opened_in: opened_in.map(str::to_string),
            layers: Vec::new(),
        }
    }

    fn last(&self) -> Option<&PreviewLayer> {
        self.layers.last()
    }

    /// Id of the most recent call on this document.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.last().and_then(|layer| layer.tool_call_id.as_deref())
    }

    pub fn call_key(&self) -> Option<&str> {
        self.last().map(|layer| layer.call_key.as_str())
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.last().map(|layer| layer.tool_name.as_str())
    }

    /// Final proposed content; `None` when the last call deletes the file.
    pub fn proposed(&self) -> Option<&str> {
        match self.last() {
            Some(layer) => layer.proposed.as_deref(),
            None => Some(self.original.as_str()),
        }
    }

    pub fn is_delete(&self) -> bool {
        self.proposed().is_none()
    }

    /// Content written into the document while the preview is staged.
    pub fn shown(&self) -> &str {
        self.last().map_or(self.original.as_str(), PreviewLayer::shown)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .flat_map(|layer| layer.warnings.iter().map(String::as_str))
    }

    fn position(&self, call_key: &str, tool_call_id: Option<&str>) -> Option<usize> {
        self.layers.iter().position(|layer| {
            layer.call_key == call_key
                || (tool_call_id.is_some() && layer.tool_call_id.as_deref() == tool_call_id)
        })
    }

    /// Reapplies every layer from `from` onwards on top of its predecessor.
    fn recompute(&mut self, from: usize) -> Result<(), PreviewError> {
        for index in from..self.layers.len() {
            let base = match index {
                0 => self.original.clone(),
                _ => self.layers[index - 1].shown().to_string(),
            };
            let outcome = self.layers[index].edit.apply(&base)?;
            let layer = &mut self.layers[index];
            layer.base = base;
            layer.proposed = outcome.content;
            layer.warnings = outcome.warnings;
        }
        Ok(())
    }
}

/// Original/modified pair for a document under preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffView {
    pub document_id: String,
    pub original: String,
    pub modified: Option<String>,
    pub hunks: Vec<DiffHunk>,
}

pub struct StageRequest<'a> {
    pub document_id: &'a str,
    /// Identifies the call across increments, e.g. message id and fragment
    /// index. Increments with the same key replace that call's layer.
    pub call_key: &'a str,
    pub tool_name: &'a str,
    pub tool_call_id: Option<&'a str>,
    pub edit: &'a FileEdit,
    pub opened_in: Option<&'a str>,
}

/// Outcome of the server reporting that it executed one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCall {
    pub document_id: String,
    /// Whether later calls on the same document are still staged.
    pub still_staged: bool,
}

/// Stages speculative tool-call results over a [`Workspace`]. Baselines only
/// move when a call is confirmed.
#[derive(Debug, Clone)]
pub struct PreviewEngine {
    extension: String,
    context_lines: usize,
    staged: HashMap<String, StagedPreview>,
}

impl PreviewEngine {
    pub fn new(extension: impl Into<String>, context_lines: usize) -> Self {
        Self {
            extension: extension.into(),
            context_lines,
            staged: HashMap::new(),
        }
    }

    pub fn is_eligible(&self, document_id: &str) -> bool {
        has_managed_extension(document_id, &self.extension)
    }

    pub fn get(&self, document_id: &str) -> Option<&StagedPreview> {
        self.staged.get(document_id)
    }

    pub fn is_previewing(&self, document_id: &str) -> bool {
        self.staged.contains_key(document_id)
    }

    pub fn staged(&self) -> impl Iterator<Item = &StagedPreview> {
        self.staged.values()
    }

    pub fn staged_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.staged.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn find_by_tool_call(&self, tool_call_id: &str) -> Option<&StagedPreview> {
        self.staged.values().find(|preview| {
            preview
                .layers
                .iter()
                .any(|layer| layer.tool_call_id.as_deref() == Some(tool_call_id))
        })
    }

    /// Recomputes the calling layer for `request.document_id` (and every layer
    /// stacked after it) and writes the result into the document's live
    /// content. Returns `Ok(None)` when the document is not eligible or not
    /// loaded.
    pub fn stage(
        &mut self,
        workspace: &mut Workspace,
        request: StageRequest<'_>,
    ) -> Result<Option<&StagedPreview>, PreviewError> {
        let document_id = request.document_id;
        if !self.is_eligible(document_id) {
            tracing::debug!(document_id, "ignoring preview for unmanaged document");
            return Ok(None);
        }

        let mut preview = match self.staged.get(document_id) {
            Some(existing) => existing.clone(),
            None => match workspace.current(document_id) {
                Some(current) => StagedPreview::new(document_id, current, request.opened_in),
                None => {
                    tracing::debug!(document_id, "ignoring preview for unloaded document");
                    return Ok(None);
                }
            },
        };

        let mut layer = PreviewLayer {
            call_key: request.call_key.to_string(),
            tool_call_id: request.tool_call_id.map(str::to_string),
            tool_name: request.tool_name.to_string(),
            edit: request.edit.clone(),
            base: String::new(),
            proposed: None,
            warnings: Vec::new(),
        };
        let from = match preview.position(request.call_key, request.tool_call_id) {
            Some(index) => {
                // The id may only arrive in a later fragment.
                if layer.tool_call_id.is_none() {
                    layer.tool_call_id = preview.layers[index].tool_call_id.take();
                }
                preview.layers[index] = layer;
                index
            }
            None => {
                preview.layers.push(layer);
                preview.layers.len() - 1
            }
        };
        preview.recompute(from)?;

        if workspace.edit(document_id, preview.shown()).is_err() {
            return Ok(None);
        }
        self.staged.insert(document_id.to_string(), preview);
        Ok(self.staged.get(document_id))
    }

    /// Accepts every staged call on the document: the baseline catches up with
    /// the proposal, or the document is closed everywhere for a delete.
    pub fn confirm(&mut self, workspace: &mut Workspace, document_id: &str) -> Option<StagedPreview> {
        let preview = self.staged.remove(document_id)?;
        if preview.is_delete() {
            workspace.close_everywhere(document_id);
        } else if let Err(error) = workspace.commit(document_id) {
            tracing::warn!(%error, document_id, "approved preview target is gone");
        }
        Some(preview)
    }

    /// The server executed `tool_call_id`: its result (and everything stacked
    /// under it) becomes the persisted content. Later calls stay staged on
    /// top of it.
    pub fn confirm_call(&mut self, workspace: &mut Workspace, tool_call_id: &str) -> Option<ExecutedCall> {
        let document_id = self.find_by_tool_call(tool_call_id)?.document_id.clone();
        let mut preview = self.staged.remove(&document_id)?;
        let index = preview
            .layers
            .iter()
            .position(|layer| layer.tool_call_id.as_deref() == Some(tool_call_id))?;

        if preview.layers[index].proposed.is_none() {
            workspace.close_everywhere(&document_id);
            return Some(ExecutedCall {
                document_id,
                still_staged: false,
            });
        }

        let persisted = preview.layers[index].shown().to_string();
        let remaining = preview.layers.split_off(index + 1);
        let committed = workspace
            .edit(&document_id, &persisted)
            .and_then(|()| workspace.commit(&document_id));
        if let Err(error) = committed {
            tracing::warn!(%error, %document_id, "executed call target is gone");
            return Some(ExecutedCall {
                document_id,
                still_staged: false,
            });
        }

        preview.original = persisted;
        preview.opened_in = None;
        preview.layers = remaining;
        if preview.layers.is_empty() {
            return Some(ExecutedCall {
                document_id,
                still_staged: false,
            });
        }
        if let Err(error) = preview.recompute(0) {
            tracing::debug!(%error, %document_id, "dropping calls stacked on an executed call");
            return Some(ExecutedCall {
                document_id,
                still_staged: false,
            });
        }
        let still_staged = workspace.edit(&document_id, preview.shown()).is_ok();
        if still_staged {
            self.staged.insert(document_id.clone(), preview);
        }
        Some(ExecutedCall {
            document_id,
            still_staged,
        })
    }

    /// Drops the preview and restores the pre-preview content. A document
    /// opened only for the preview is closed again.
    pub fn discard(&mut self, workspace: &mut Workspace, document_id: &str) -> Option<StagedPreview> {
        let preview = self.staged.remove(document_id)?;
        if let Err(error) = workspace.edit(document_id, &preview.original) {
            tracing::debug!(%error, document_id, "discarded preview target is gone");
        }
        if let Some(tab_bar_id) = &preview.opened_in {
            if workspace.tabs().get(tab_bar_id).is_some_and(|bar| bar.contains(document_id)) {
                let _ = workspace.close_tab(tab_bar_id, document_id);
            }
        }
        Some(preview)
    }

    pub fn discard_all(&mut self, workspace: &mut Workspace) -> Vec<StagedPreview> {
        self.staged_ids()
            .into_iter()
            .filter_map(|document_id| self.discard(workspace, &document_id))
            .collect()
    }

    /// Keeps staging records pointing at a renamed document.
    pub fn rename(&mut self, old_id: &str, new_id: &str) {
        if let Some(mut preview) = self.staged.remove(old_id) {
            preview.document_id = new_id.to_string();
            self.staged.insert(new_id.to_string(), preview);
        }
    }

    pub fn diff_view(&self, document_id: &str) -> Option<DiffView> {
        let preview = self.staged.get(document_id)?;
        let modified = preview.proposed().map(str::to_string);
        Some(DiffView {
            document_id: document_id.to_string(),
            original: preview.original.clone(),
            hunks: diff_hunks(
                &preview.original,
                modified.as_deref().unwrap_or(""),
                self.context_lines,
            ),
            modified,
        })
    }
}

use super::super::interrupt::{Interrupt, TurnState};
use super::{ConversationManager, SessionUpdate};
use crate::tool_preview::StageRequest;
use crate::tools::assembler::PendingToolCall;
use crate::tools::edits::{is_file_edit_tool, FileEdit, WRITE_FILE_TOOL};
use serde_json::Value;

enum PreviewTarget {
    Ready { opened_in: Option<String> },
    Unavailable,
}

struct PreviewSource<'a> {
    document_id: &'a str,
    call_key: &'a str,
    tool_name: &'a str,
    tool_call_id: Option<&'a str>,
    args: &'a Value,
    complete: bool,
}

impl ConversationManager {
    /// Live preview for a tool call that is still streaming. Only calls whose
    /// `path` has fully arrived are considered. The call is identified by its
    /// message and fragment index, since its id may stream in later.
    pub(super) async fn preview_pending_call(&mut self, message_id: &str, call: &PendingToolCall) {
        let Some(tool_name) = call.name.as_deref().filter(|name| is_file_edit_tool(name)) else {
            return;
        };
        let Some(document_id) = call.settled_str_arg("path") else {
            return;
        };
        let Some(args) = call.args.value() else {
            return;
        };
        let call_key = format!("{message_id}#{}", call.index);
        self.stage_preview(PreviewSource {
            document_id,
            call_key: &call_key,
            tool_name,
            tool_call_id: call.id.as_deref(),
            args,
            complete: call.args.is_complete(),
        })
        .await;
    }

    /// Interrupt parameters are the final word on what the tool will do, so the
    /// target's most recent call is recomputed from them.
    pub(super) async fn preview_interrupt_target(&mut self, interrupt: &Interrupt) {
        if self.coordinator.state() != TurnState::Streaming {
            return;
        }
        if !is_file_edit_tool(&interrupt.tool_name) {
            return;
        }
        let Some(document_id) = interrupt.target_document_id.as_deref() else {
            return;
        };
        let staged = self.previews.get(document_id);
        let call_key = staged
            .and_then(|preview| preview.call_key())
            .map_or_else(|| format!("interrupt:{}", interrupt.id), str::to_string);
        let tool_call_id = staged
            .and_then(|preview| preview.tool_call_id())
            .map(str::to_string);
        self.stage_preview(PreviewSource {
            document_id,
            call_key: &call_key,
            tool_name: &interrupt.tool_name,
            tool_call_id: tool_call_id.as_deref(),
            args: &interrupt.raw_parameters,
            complete: true,
        })
        .await;
    }

    async fn stage_preview(&mut self, source: PreviewSource<'_>) {
        let document_id = source.document_id;
        if !self.previews.is_eligible(document_id) {
            tracing::debug!(document_id, "preview target has an unmanaged extension");
            return;
        }

        let edit = match FileEdit::from_tool_call(source.tool_name, source.args) {
            // A write whose content has not started streaming is not a delete yet.
            Ok(edit) if edit.is_delete() && !source.complete => return,
            Ok(edit) => edit,
            Err(error) => {
                if source.complete {
                    self.emit(SessionUpdate::Warning(format!("{document_id}: {error}")));
                }
                return;
            }
        };

        let opened_in = match self.ensure_preview_target(document_id, source.tool_name).await {
            PreviewTarget::Ready { opened_in } => opened_in,
            PreviewTarget::Unavailable => return,
        };

        let previous_warnings = self
            .previews
            .get(document_id)
            .map(|preview| preview.warnings().map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        let staged = self.previews.stage(
            &mut self.workspace,
            StageRequest {
                document_id,
                call_key: source.call_key,
                tool_name: source.tool_name,
                tool_call_id: source.tool_call_id,
                edit: &edit,
                opened_in: opened_in.as_deref(),
            },
        );

        match staged {
            Ok(Some(preview)) => {
                let tool_call_id = preview.tool_call_id().map(str::to_string);
                let new_warnings: Vec<String> = if source.complete {
                    preview
                        .warnings()
                        .filter(|warning| !previous_warnings.iter().any(|seen| seen == warning))
                        .map(str::to_string)
                        .collect()
                } else {
                    Vec::new()
                };
                self.emit(SessionUpdate::PreviewStaged {
                    document_id: document_id.to_string(),
                    tool_call_id,
                });
                for warning in new_warnings {
                    tracing::debug!(document_id, %warning, "preview warning");
                    self.emit(SessionUpdate::Warning(format!("{document_id}: {warning}")));
                }
            }
            Ok(None) => {}
            Err(error) => {
                tracing::debug!(document_id, %error, "preview not staged");
                if source.complete {
                    self.emit(SessionUpdate::Warning(format!("{document_id}: {error}")));
                }
            }
        }
    }

    /// Makes sure the target is open and loaded. Documents nobody has open are
    /// fetched and opened in the active tab bar; a document that does not
    /// exist yet is only acceptable for a whole-file write.
    async fn ensure_preview_target(&mut self, document_id: &str, tool_name: &str) -> PreviewTarget {
        if self.workspace.store().is_loaded(document_id) {
            return PreviewTarget::Ready { opened_in: None };
        }
        if self.workspace.store().contains(document_id)
            || self.unavailable_targets.contains(document_id)
        {
            return PreviewTarget::Unavailable;
        }

        let content = match self.documents.fetch(document_id).await {
            Ok(Some(content)) => content,
            Ok(None) if tool_name == WRITE_FILE_TOOL => String::new(),
            Ok(None) => {
                tracing::debug!(document_id, tool_name, "preview target does not exist");
                self.unavailable_targets.insert(document_id.to_string());
                return PreviewTarget::Unavailable;
            }
            Err(error) => {
                tracing::debug!(document_id, %error, "could not fetch preview target");
                self.unavailable_targets.insert(document_id.to_string());
                return PreviewTarget::Unavailable;
            }
        };

        let tab_bar_id = self.workspace.tabs().active_tab_bar_id().to_string();
        if let Err(error) = self.workspace.open_document(&tab_bar_id, document_id) {
            tracing::debug!(document_id, %error, "could not open preview target");
            return PreviewTarget::Unavailable;
        }
        self.workspace.seed(document_id, &content);
        PreviewTarget::Ready {
            opened_in: Some(tab_bar_id),
        }
    }
}

use crate::error::TurnError;
use crate::types::{ApprovalChoice, InterruptDescriptor};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Streaming,
    PausedForApproval,
}

/// A server-initiated pause waiting on a human decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupt {
    pub id: String,
    pub tool_name: String,
    pub target_document_id: Option<String>,
    pub description: String,
    pub raw_parameters: Value,
}

impl Interrupt {
    pub fn from_descriptor(descriptor: InterruptDescriptor) -> Self {
        let raw_parameters = descriptor.parameters.unwrap_or(Value::Null);
        let target_document_id = raw_parameters
            .get("path")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .map(str::to_string);
        let description = descriptor
            .description
            .unwrap_or_else(|| format!("Run {}?", descriptor.tool_name));
        Self {
            id: descriptor.id,
            tool_name: descriptor.tool_name,
            target_document_id,
            description,
            raw_parameters,
        }
    }
}

/// Turn lifecycle: `Idle -> Streaming -> PausedForApproval -> Streaming -> Idle`.
/// Holds at most one interrupt.
#[derive(Debug, Clone)]
pub struct InterruptCoordinator {
    state: TurnState,
    active: Option<Interrupt>,
}

impl Default for InterruptCoordinator {
    fn default() -> Self {
        Self {
            state: TurnState::Idle,
            active: None,
        }
    }
}

impl InterruptCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn active(&self) -> Option<&Interrupt> {
        self.active.as_ref()
    }

    pub fn begin_turn(&mut self) -> Result<(), TurnError> {
        if self.state != TurnState::Idle {
            return Err(TurnError::Busy);
        }
        self.state = TurnState::Streaming;
        Ok(())
    }

    pub fn pause(&mut self, interrupt: Interrupt) -> Result<&Interrupt, TurnError> {
        match self.state {
            TurnState::Streaming => {
                self.state = TurnState::PausedForApproval;
                Ok(self.active.insert(interrupt))
            }
            TurnState::PausedForApproval => {
                let active = self
                    .active
                    .as_ref()
                    .map(|existing| existing.id.clone())
                    .unwrap_or_default();
                tracing::warn!(
                    active = %active,
                    incoming = %interrupt.id,
                    "rejecting overlapping interrupt"
                );
                Err(TurnError::AlreadyPaused {
                    active,
                    incoming: interrupt.id,
                })
            }
            TurnState::Idle => Err(TurnError::NotStreaming),
        }
    }

    /// Takes the pending interrupt and returns to streaming so the
    /// continuation can be consumed.
    pub fn resolve(&mut self, choice: ApprovalChoice) -> Result<Interrupt, TurnError> {
        if self.state != TurnState::PausedForApproval {
            return Err(TurnError::NotPaused);
        }
        let interrupt = self.active.take().ok_or(TurnError::NotPaused)?;
        tracing::debug!(interrupt_id = %interrupt.id, ?choice, "interrupt resolved");
        self.state = TurnState::Streaming;
        Ok(interrupt)
    }

    /// Ends the turn from any state, dropping a pending interrupt.
    pub fn finish_turn(&mut self) {
        if let Some(interrupt) = self.active.take() {
            tracing::debug!(interrupt_id = %interrupt.id, "dropping pending interrupt");
        }
        self.state = TurnState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interrupt(id: &str) -> Interrupt {
        Interrupt::from_descriptor(InterruptDescriptor {
            id: id.to_string(),
            tool_name: "write_file".to_string(),
            description: None,
            parameters: Some(json!({"path": "notes.md", "content": "Z"})),
        })
    }

    #[test]
    fn test_descriptor_conversion_extracts_target() {
        let interrupt = interrupt("i1");
        assert_eq!(interrupt.target_document_id.as_deref(), Some("notes.md"));
        assert_eq!(interrupt.description, "Run write_file?");

        let without_params = Interrupt::from_descriptor(InterruptDescriptor {
            id: "i2".to_string(),
            tool_name: "web_search".to_string(),
            description: Some("Search the web".to_string()),
            parameters: None,
        });
        assert_eq!(without_params.target_document_id, None);
        assert_eq!(without_params.raw_parameters, Value::Null);
    }

    #[test]
    fn test_full_cycle() {
        let mut coordinator = InterruptCoordinator::new();
        coordinator.begin_turn().unwrap();
        assert_eq!(coordinator.state(), TurnState::Streaming);

        coordinator.pause(interrupt("i1")).unwrap();
        assert_eq!(coordinator.state(), TurnState::PausedForApproval);
        assert_eq!(coordinator.active().unwrap().id, "i1");

        let resolved = coordinator.resolve(ApprovalChoice::Approve).unwrap();
        assert_eq!(resolved.id, "i1");
        assert_eq!(coordinator.state(), TurnState::Streaming);
        assert!(coordinator.active().is_none());

        coordinator.finish_turn();
        assert_eq!(coordinator.state(), TurnState::Idle);
    }

    #[test]
    fn test_second_interrupt_while_paused_is_rejected() {
        let mut coordinator = InterruptCoordinator::new();
        coordinator.begin_turn().unwrap();
        coordinator.pause(interrupt("i1")).unwrap();

        let error = coordinator.pause(interrupt("i2")).unwrap_err();
        assert_eq!(
            error,
            TurnError::AlreadyPaused {
                active: "i1".to_string(),
                incoming: "i2".to_string()
            }
        );
        assert_eq!(coordinator.active().unwrap().id, "i1");
    }

    #[test]
    fn test_invalid_transitions() {
        let mut coordinator = InterruptCoordinator::new();
        assert!(coordinator.resolve(ApprovalChoice::Reject).is_err());
        assert!(coordinator.pause(interrupt("i1")).is_err());

        coordinator.begin_turn().unwrap();
        assert_eq!(coordinator.begin_turn(), Err(TurnError::Busy));

        coordinator.pause(interrupt("i1")).unwrap();
        coordinator.finish_turn();
        assert_eq!(coordinator.state(), TurnState::Idle);
        assert!(coordinator.active().is_none());
    }
}

use std::cell::Cell as Latch;
use std::collections::HashMap;

use thiserror::Error;

use crate::modules::board::AgentId;

/// Opaque payload an agent publishes for its peers.
pub type Message = serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("could not find drone #{target}")]
    UnknownAgent { target: AgentId },
}

/// Outgoing messages captured at the start of a tick's decision phase.
#[derive(Clone, Debug, Default)]
pub struct Outboxes {
    messages: HashMap<AgentId, Message>,
}

impl Outboxes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: AgentId, message: Message) {
        self.messages.insert(id, message);
    }

    /// Drops an agent destroyed mid-tick; later lookups fail.
    pub fn forget(&mut self, id: AgentId) {
        self.messages.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl FromIterator<(AgentId, Message)> for Outboxes {
    fn from_iter<I: IntoIterator<Item = (AgentId, Message)>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

/// Read-only message lookup handed to a decision function.
///
/// The first failed lookup is latched so the engine can abort the step even
/// when the decision function discards the error.
pub struct MessageRelay<'a> {
    outboxes: &'a Outboxes,
    fault: Latch<Option<AgentId>>,
}

impl<'a> MessageRelay<'a> {
    pub fn new(outboxes: &'a Outboxes) -> Self {
        Self {
            outboxes,
            fault: Latch::new(None),
        }
    }

    pub fn send_message(&self, target: AgentId) -> Result<Message, RelayError> {
        match self.outboxes.messages.get(&target) {
            Some(message) => Ok(message.clone()),
            None => {
                if self.fault.get().is_none() {
                    self.fault.set(Some(target));
                }
                Err(RelayError::UnknownAgent { target })
            }
        }
    }

    pub fn fault(&self) -> Option<RelayError> {
        self.fault
            .get()
            .map(|target| RelayError::UnknownAgent { target })
    }
}

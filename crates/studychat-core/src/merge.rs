//! Combines backend history with optimistic local messages.

use std::collections::HashSet;

use crate::state::{LocalMessage, Message, MessageId};

/// Backend messages in order, then local messages in order.
///
/// No content matching is attempted. A local message that the backend has
/// already confirmed (its `confirmed_as` id appears in `backend`) is left out,
/// which keeps the window between a reply and the authoritative refetch free
/// of double renders.
pub fn merge(backend: &[Message], local: &[LocalMessage]) -> Vec<Message> {
    let backend_ids: HashSet<&MessageId> = backend.iter().map(|m| &m.id).collect();

    let mut merged = Vec::with_capacity(backend.len() + local.len());
    merged.extend(backend.iter().cloned());
    merged.extend(
        local
            .iter()
            .filter(|l| l.confirmed_as.as_ref().map_or(true, |id| !backend_ids.contains(id)))
            .map(|l| l.message.clone()),
    );
    merged
}

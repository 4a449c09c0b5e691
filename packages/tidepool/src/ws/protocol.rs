use serde::Deserialize;

/// The only shape accepted from clients over the room socket. Room id,
/// hub id, and author id are never taken from the wire; the session
/// supplies them from validated context.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundPayload {
    pub content: String,
}

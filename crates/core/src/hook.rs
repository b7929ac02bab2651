//! Pre-compaction flush hook.

use crate::error::FlushError;
use crate::message::Message;

/// Receives the messages that auto-compaction is about to fold into a
/// summary, before it does so.
///
/// Called synchronously. A returned error is logged and does not stop
/// compaction.
pub trait FlushHook: Send + Sync {
    fn flush(&self, messages: &[Message]) -> Result<(), FlushError>;
}

impl<F> FlushHook for F
where
    F: Fn(&[Message]) -> Result<(), FlushError> + Send + Sync,
{
    fn flush(&self, messages: &[Message]) -> Result<(), FlushError> {
        self(messages)
    }
}

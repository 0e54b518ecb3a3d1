//! Non-volatile storage of the node's CANID.
use crate::protocol::transport::can_id::CanIdentifier;

/// Persistence collaborator. Reads happen once at power-up, writes after every
/// allocation or explicit change, always outside interrupt context.
pub trait CanIdStore {
    /// Stored CANID, `None` when blank or invalid.
    fn load_identifier(&mut self) -> Option<CanIdentifier>;
    /// Store `id`; `None` erases it (factory reset).
    fn persist_identifier(&mut self, id: Option<CanIdentifier>);
}

impl<S: CanIdStore> CanIdStore for &mut S {
    fn load_identifier(&mut self) -> Option<CanIdentifier> {
        (**self).load_identifier()
    }

    fn persist_identifier(&mut self, id: Option<CanIdentifier>) {
        (**self).persist_identifier(id)
    }
}

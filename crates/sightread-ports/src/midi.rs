use crate::types::*;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("midi is not supported by this host")]
    Unsupported,
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortState {
    Connected,
    Disconnected,
}

/// Hot-plug notification for a single input port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStateChange {
    pub device: MidiInputDevice,
    pub state: PortState,
}

/// Raw message handler: invoked once per message, in driver order.
pub type MidiMessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

pub type StateChangeHandler = Arc<dyn Fn(PortStateChange) + Send + Sync + 'static>;

/// Completion of an access request. Called exactly once, possibly from another thread.
pub type AccessGrant = Box<dyn FnOnce(Result<Arc<dyn MidiAccess>, MidiError>) + Send + 'static>;

/// A granted MIDI access handle.
pub trait MidiAccess: Send + Sync {
    /// Input ports currently attached.
    fn inputs(&self) -> Vec<MidiInputDevice>;

    /// Install `handler` as the single message handler of `device_id`.
    /// A second bind on the same port replaces the first.
    fn bind_input(&self, device_id: &DeviceId, handler: MidiMessageHandler) -> Result<(), MidiError>;

    /// Install the single hot-plug listener, replacing any previous one.
    fn set_state_change_handler(&self, handler: StateChangeHandler);

    /// Drop every message handler and the hot-plug listener.
    fn unbind_all(&self);
}

pub trait MidiAccessPort: Send + Sync {
    /// `false` when the host has no MIDI capability at all.
    fn is_supported(&self) -> bool;

    fn request_access(&self, grant: AccessGrant);
}

use parking_lot::Mutex;
use sightread_ports::midi::{
    MidiAccess, MidiAccessPort, MidiError, MidiMessageHandler, PortState, PortStateChange,
};
use sightread_ports::types::{DeviceId, MidiInputDevice};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

pub type NoteCallback = Arc<dyn Fn(u8) + Send + Sync + 'static>;
pub type ConnectionCallback = Arc<dyn Fn(bool) + Send + Sync + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiCommand {
    NoteOn(u8),
    NoteOff(u8),
}

/// Decode a raw channel message. Only note on/off matter; the channel is dropped.
pub fn decode_message(message: &[u8]) -> Option<MidiCommand> {
    let status = *message.first()?;
    match status & 0xF0 {
        0x80 => {
            if message.len() < 3 {
                return None;
            }
            Some(MidiCommand::NoteOff(message[1]))
        }
        0x90 => {
            if message.len() < 3 {
                return None;
            }
            // velocity 0 means note off
            if message[2] == 0 {
                Some(MidiCommand::NoteOff(message[1]))
            } else {
                Some(MidiCommand::NoteOn(message[1]))
            }
        }
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiEngineState {
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Clone, Default)]
struct Callbacks {
    on_note_on: Option<NoteCallback>,
    on_connection_change: Option<ConnectionCallback>,
    on_note_off: Option<NoteCallback>,
}

enum AccessSlot {
    Uninitialized,
    Initializing,
    Ready(Arc<dyn MidiAccess>),
}

struct EngineSlot {
    access: AccessSlot,
    // bumped by shutdown so a late grant is discarded
    generation: u64,
}

struct Inner {
    port: Box<dyn MidiAccessPort>,
    slot: Mutex<EngineSlot>,
    callbacks: Mutex<Callbacks>,
    // `None` listens to every port
    selected: Mutex<Option<DeviceId>>,
    connected: AtomicBool,
}

/// Keyboard input: owns the access handle and keeps every attached port bound.
pub struct MidiInputEngine {
    inner: Arc<Inner>,
}

impl MidiInputEngine {
    pub fn new(port: Box<dyn MidiAccessPort>) -> Self {
        Self {
            inner: Arc::new(Inner {
                port,
                slot: Mutex::new(EngineSlot {
                    access: AccessSlot::Uninitialized,
                    generation: 0,
                }),
                callbacks: Mutex::new(Callbacks::default()),
                selected: Mutex::new(None),
                connected: AtomicBool::new(false),
            }),
        }
    }

    /// Install callbacks and make sure the device is open.
    ///
    /// Callbacks are replaced first, so a request already in flight delivers
    /// to the newest set. Only the first call ever asks the host for access;
    /// later calls just re-report connectivity and re-bind the inputs.
    pub fn initialize(
        &self,
        on_note_on: NoteCallback,
        on_connection_change: Option<ConnectionCallback>,
        on_note_off: Option<NoteCallback>,
    ) {
        *self.inner.callbacks.lock() = Callbacks {
            on_note_on: Some(on_note_on),
            on_connection_change,
            on_note_off,
        };

        let mut slot = self.inner.slot.lock();
        match &slot.access {
            AccessSlot::Ready(access) => {
                let access = Arc::clone(access);
                drop(slot);
                self.inner.refresh(&access);
                return;
            }
            AccessSlot::Initializing => return,
            AccessSlot::Uninitialized => {}
        }

        if !self.inner.port.is_supported() {
            log::warn!("midi: host has no midi support");
            return;
        }

        slot.access = AccessSlot::Initializing;
        let generation = slot.generation;
        drop(slot);

        let inner = Arc::clone(&self.inner);
        self.inner
            .port
            .request_access(Box::new(move |result| inner.on_access(generation, result)));
    }

    /// Restrict note events to one input, or listen to all with `None`.
    ///
    /// Connection status then only counts the selected port. Takes effect
    /// immediately when the engine is already running.
    pub fn select_input(&self, device: Option<DeviceId>) {
        *self.inner.selected.lock() = device;
        let access = match &self.inner.slot.lock().access {
            AccessSlot::Ready(access) => Arc::clone(access),
            _ => return,
        };
        self.inner.refresh(&access);
    }

    pub fn selected_input(&self) -> Option<DeviceId> {
        self.inner.selected.lock().clone()
    }

    pub fn state(&self) -> MidiEngineState {
        match self.inner.slot.lock().access {
            AccessSlot::Uninitialized => MidiEngineState::Uninitialized,
            AccessSlot::Initializing => MidiEngineState::Initializing,
            AccessSlot::Ready(_) => MidiEngineState::Ready,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Relaxed)
    }

    /// Unbind every port and drop the handle. Safe in any state.
    pub fn shutdown(&self) {
        let mut slot = self.inner.slot.lock();
        slot.generation = slot.generation.wrapping_add(1);
        let previous = std::mem::replace(&mut slot.access, AccessSlot::Uninitialized);
        drop(slot);

        if let AccessSlot::Ready(access) = previous {
            access.unbind_all();
            log::info!("midi: input engine shut down");
        }
        self.inner.connected.store(false, Ordering::Relaxed);
    }
}

impl Drop for MidiInputEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn on_access(self: &Arc<Self>, generation: u64, result: Result<Arc<dyn MidiAccess>, MidiError>) {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            drop(slot);
            if let Ok(access) = result {
                access.unbind_all();
            }
            log::debug!("midi: discarding access granted after shutdown");
            return;
        }

        match result {
            Ok(access) => {
                slot.access = AccessSlot::Ready(Arc::clone(&access));
                drop(slot);
                log::info!("midi: access granted");

                let weak = Arc::downgrade(self);
                access.set_state_change_handler(Arc::new(move |change: PortStateChange| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_state_change(change);
                    }
                }));
                self.refresh(&access);
            }
            Err(err) => {
                slot.access = AccessSlot::Uninitialized;
                drop(slot);
                log::error!("midi: access request failed: {err}");
            }
        }
    }

    fn on_state_change(self: &Arc<Self>, change: PortStateChange) {
        let access = match &self.slot.lock().access {
            AccessSlot::Ready(access) => Arc::clone(access),
            _ => return,
        };
        log::info!("midi: port {} {:?}", change.device.name, change.state);
        self.report_connection(&access);
        if change.state == PortState::Connected && self.accepts(&change.device.id) {
            self.bind(&access, &change.device);
        }
    }

    fn refresh(self: &Arc<Self>, access: &Arc<dyn MidiAccess>) {
        self.report_connection(access);
        for device in access.inputs() {
            if self.accepts(&device.id) {
                self.bind(access, &device);
            }
        }
    }

    fn report_connection(&self, access: &Arc<dyn MidiAccess>) {
        let connected = access.inputs().iter().any(|d| self.accepts(&d.id));
        self.connected.store(connected, Ordering::Relaxed);
        let callback = self.callbacks.lock().on_connection_change.clone();
        if let Some(callback) = callback {
            callback(connected);
        }
    }

    fn bind(self: &Arc<Self>, access: &Arc<dyn MidiAccess>, device: &MidiInputDevice) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let id = device.id.clone();
        let handler: MidiMessageHandler = Arc::new(move |message: &[u8]| {
            if let (Some(inner), Some(command)) = (weak.upgrade(), decode_message(message)) {
                if inner.accepts(&id) {
                    inner.dispatch(command);
                }
            }
        });
        if let Err(err) = access.bind_input(&device.id, handler) {
            log::warn!("midi: could not bind {}: {err}", device.name);
        }
    }

    fn accepts(&self, id: &DeviceId) -> bool {
        self.selected.lock().as_ref().map_or(true, |selected| selected == id)
    }

    fn dispatch(&self, command: MidiCommand) {
        let callbacks = self.callbacks.lock().clone();
        match command {
            MidiCommand::NoteOn(note) => {
                if let Some(cb) = callbacks.on_note_on {
                    cb(note);
                }
            }
            MidiCommand::NoteOff(note) => {
                if let Some(cb) = callbacks.on_note_off {
                    cb(note);
                }
            }
        }
    }
}

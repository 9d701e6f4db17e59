use parking_lot::Mutex;
use sightread_core::{MidiEngineState, MidiInputEngine, NoteCallback};
use sightread_ports::midi::{
    AccessGrant, MidiAccess, MidiAccessPort, MidiError, MidiMessageHandler, PortState,
    PortStateChange, StateChangeHandler,
};
use sightread_ports::types::{DeviceId, MidiInputDevice};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn device(id: &str) -> MidiInputDevice {
    MidiInputDevice {
        id: DeviceId(id.to_string()),
        name: format!("Keyboard {id}"),
    }
}

#[derive(Default)]
struct FakeAccess {
    inputs: Mutex<Vec<MidiInputDevice>>,
    handlers: Mutex<HashMap<DeviceId, MidiMessageHandler>>,
    state_handler: Mutex<Option<StateChangeHandler>>,
    binds: AtomicUsize,
    unbound: AtomicBool,
}

impl FakeAccess {
    fn with_inputs(ids: &[&str]) -> Arc<Self> {
        let access = Self::default();
        *access.inputs.lock() = ids.iter().map(|id| device(id)).collect();
        Arc::new(access)
    }

    fn emit(&self, id: &str, message: &[u8]) {
        let handler = self.handlers.lock().get(&DeviceId(id.to_string())).cloned();
        if let Some(handler) = handler {
            handler(message);
        }
    }

    fn plug(&self, id: &str) {
        self.inputs.lock().push(device(id));
        self.notify(id, PortState::Connected);
    }

    fn unplug(&self, id: &str) {
        self.inputs.lock().retain(|d| d.id.0 != id);
        self.handlers.lock().remove(&DeviceId(id.to_string()));
        self.notify(id, PortState::Disconnected);
    }

    fn notify(&self, id: &str, state: PortState) {
        let handler = self.state_handler.lock().clone();
        if let Some(handler) = handler {
            handler(PortStateChange {
                device: device(id),
                state,
            });
        }
    }
}

impl MidiAccess for FakeAccess {
    fn inputs(&self) -> Vec<MidiInputDevice> {
        self.inputs.lock().clone()
    }

    fn bind_input(&self, device_id: &DeviceId, handler: MidiMessageHandler) -> Result<(), MidiError> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().insert(device_id.clone(), handler);
        Ok(())
    }

    fn set_state_change_handler(&self, handler: StateChangeHandler) {
        *self.state_handler.lock() = Some(handler);
    }

    fn unbind_all(&self) {
        self.handlers.lock().clear();
        *self.state_handler.lock() = None;
        self.unbound.store(true, Ordering::SeqCst);
    }
}

/// Host whose grants are resolved by the test.
struct DeferredPort {
    supported: bool,
    requests: Arc<AtomicUsize>,
    pending: Arc<Mutex<Vec<AccessGrant>>>,
}

struct Host {
    requests: Arc<AtomicUsize>,
    pending: Arc<Mutex<Vec<AccessGrant>>>,
}

impl Host {
    fn grant(&self, access: &Arc<FakeAccess>) {
        let grant = self.pending.lock().pop().expect("pending request");
        grant(Ok(Arc::clone(access) as Arc<dyn MidiAccess>));
    }

    fn deny(&self) {
        let grant = self.pending.lock().pop().expect("pending request");
        grant(Err(MidiError::DeviceUnavailable("denied".to_string())));
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl MidiAccessPort for DeferredPort {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn request_access(&self, grant: AccessGrant) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push(grant);
    }
}

fn engine(supported: bool) -> (MidiInputEngine, Host) {
    let requests = Arc::new(AtomicUsize::new(0));
    let pending = Arc::new(Mutex::new(Vec::new()));
    let port = DeferredPort {
        supported,
        requests: Arc::clone(&requests),
        pending: Arc::clone(&pending),
    };
    (MidiInputEngine::new(Box::new(port)), Host { requests, pending })
}

#[derive(Default)]
struct Recorder {
    on: Mutex<Vec<u8>>,
    off: Mutex<Vec<u8>>,
    connection: Mutex<Vec<bool>>,
}

impl Recorder {
    fn install(self: &Arc<Self>, engine: &MidiInputEngine) {
        let on = Arc::clone(self);
        let conn = Arc::clone(self);
        let off = Arc::clone(self);
        let on_note_on: NoteCallback = Arc::new(move |n: u8| on.on.lock().push(n));
        engine.initialize(
            on_note_on,
            Some(Arc::new(move |c: bool| conn.connection.lock().push(c))),
            Some(Arc::new(move |n: u8| off.off.lock().push(n))),
        );
    }
}

#[test]
fn concurrent_initialize_makes_one_request_and_keeps_latest_callbacks() {
    let (engine, host) = engine(true);
    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());

    first.install(&engine);
    assert_eq!(engine.state(), MidiEngineState::Initializing);
    second.install(&engine);
    assert_eq!(host.requests(), 1);

    let access = FakeAccess::with_inputs(&["a"]);
    host.grant(&access);
    assert_eq!(engine.state(), MidiEngineState::Ready);

    access.emit("a", &[0x90, 60, 127]);
    assert_eq!(*second.on.lock(), vec![60]);
    assert_eq!(*second.connection.lock(), vec![true]);
    assert!(first.on.lock().is_empty());
    assert!(first.connection.lock().is_empty());
}

#[test]
fn note_messages_reach_the_right_callbacks() {
    let (engine, host) = engine(true);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    let access = FakeAccess::with_inputs(&["a"]);
    host.grant(&access);

    access.emit("a", &[0x90, 60, 127]);
    access.emit("a", &[0x80, 60, 0]);
    access.emit("a", &[0x90, 62, 0]);
    access.emit("a", &[0xB0, 64, 127]);
    access.emit("a", &[]);

    assert_eq!(*rec.on.lock(), vec![60]);
    assert_eq!(*rec.off.lock(), vec![60, 62]);
}

#[test]
fn reinitialize_when_ready_rebinds_without_new_request() {
    let (engine, host) = engine(true);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    let access = FakeAccess::with_inputs(&["a", "b"]);
    host.grant(&access);
    assert_eq!(access.binds.load(Ordering::SeqCst), 2);

    let again = Arc::new(Recorder::default());
    again.install(&engine);

    assert_eq!(host.requests(), 1);
    assert_eq!(access.binds.load(Ordering::SeqCst), 4);
    assert_eq!(access.handlers.lock().len(), 2);
    assert_eq!(*again.connection.lock(), vec![true]);

    access.emit("b", &[0x91, 70, 90]);
    assert_eq!(*again.on.lock(), vec![70]);
    assert!(rec.on.lock().is_empty());
}

#[test]
fn no_inputs_reports_disconnected() {
    let (engine, host) = engine(true);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    host.grant(&FakeAccess::with_inputs(&[]));

    assert_eq!(*rec.connection.lock(), vec![false]);
    assert!(!engine.is_connected());
}

#[test]
fn hot_plug_binds_new_ports_and_reports_status() {
    let (engine, host) = engine(true);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    let access = FakeAccess::with_inputs(&[]);
    host.grant(&access);

    access.plug("late");
    assert!(engine.is_connected());
    access.emit("late", &[0x90, 48, 100]);
    assert_eq!(*rec.on.lock(), vec![48]);

    access.unplug("late");
    assert!(!engine.is_connected());
    assert_eq!(*rec.connection.lock(), vec![false, true, false]);
}

#[test]
fn selected_input_filters_notes_and_connection() {
    let (engine, host) = engine(true);
    engine.select_input(Some(DeviceId("b".to_string())));
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    let access = FakeAccess::with_inputs(&["a", "b"]);
    host.grant(&access);

    assert_eq!(access.binds.load(Ordering::SeqCst), 1);
    access.emit("a", &[0x90, 60, 127]);
    access.emit("b", &[0x90, 64, 127]);
    assert_eq!(*rec.on.lock(), vec![64]);

    access.unplug("b");
    assert!(!engine.is_connected());
    access.plug("c");
    assert_eq!(*rec.connection.lock(), vec![true, false, false]);
    assert_eq!(access.binds.load(Ordering::SeqCst), 1);
}

#[test]
fn selecting_while_running_switches_ports() {
    let (engine, host) = engine(true);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    let access = FakeAccess::with_inputs(&["a", "b"]);
    host.grant(&access);

    engine.select_input(Some(DeviceId("a".to_string())));
    access.emit("a", &[0x90, 60, 127]);
    access.emit("b", &[0x90, 62, 127]);
    assert_eq!(*rec.on.lock(), vec![60]);

    engine.select_input(Some(DeviceId("missing".to_string())));
    assert!(!engine.is_connected());

    engine.select_input(None);
    assert_eq!(engine.selected_input(), None);
    access.emit("b", &[0x90, 62, 127]);
    assert_eq!(*rec.on.lock(), vec![60, 62]);
    assert!(engine.is_connected());
}

#[test]
fn unsupported_host_is_silently_skipped() {
    let (engine, host) = engine(false);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);

    assert_eq!(host.requests(), 0);
    assert_eq!(engine.state(), MidiEngineState::Uninitialized);
    assert!(rec.connection.lock().is_empty());
}

#[test]
fn failed_request_can_be_retried() {
    let (engine, host) = engine(true);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    host.deny();
    assert_eq!(engine.state(), MidiEngineState::Uninitialized);

    rec.install(&engine);
    assert_eq!(host.requests(), 2);
    host.grant(&FakeAccess::with_inputs(&["a"]));
    assert_eq!(engine.state(), MidiEngineState::Ready);
}

#[test]
fn grant_after_shutdown_is_discarded() {
    let (engine, host) = engine(true);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    engine.shutdown();

    let access = FakeAccess::with_inputs(&["a"]);
    host.grant(&access);

    assert_eq!(engine.state(), MidiEngineState::Uninitialized);
    assert!(access.unbound.load(Ordering::SeqCst));
    assert!(access.handlers.lock().is_empty());
    assert!(rec.connection.lock().is_empty());
}

#[test]
fn shutdown_when_ready_unbinds_everything() {
    let (engine, host) = engine(true);
    let rec = Arc::new(Recorder::default());
    rec.install(&engine);
    let access = FakeAccess::with_inputs(&["a"]);
    host.grant(&access);

    engine.shutdown();
    engine.shutdown();

    assert_eq!(engine.state(), MidiEngineState::Uninitialized);
    assert!(access.unbound.load(Ordering::SeqCst));
    assert!(!engine.is_connected());
    access.emit("a", &[0x90, 60, 127]);
    assert!(rec.on.lock().is_empty());
}

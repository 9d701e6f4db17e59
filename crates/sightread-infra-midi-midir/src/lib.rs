use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use parking_lot::Mutex;
use sightread_ports::midi::{
    AccessGrant, MidiAccess, MidiAccessPort, MidiError, MidiMessageHandler, PortState,
    PortStateChange, StateChangeHandler,
};
use sightread_ports::types::{DeviceId, MidiInputDevice};
use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub struct MidirMidiAccessPort {
    client_name: String,
    poll_interval: Duration,
}

impl MidirMidiAccessPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Default for MidirMidiAccessPort {
    fn default() -> Self {
        Self::new("SightRead")
    }
}

impl MidiAccessPort for MidirMidiAccessPort {
    fn is_supported(&self) -> bool {
        MidiInput::new(&self.client_name).is_ok()
    }

    fn request_access(&self, grant: AccessGrant) {
        let result = MidirMidiAccess::open(self.client_name.clone(), self.poll_interval)
            .map(|access| Arc::new(access) as Arc<dyn MidiAccess>);
        grant(result);
    }
}

fn create_midi_in(client_name: &str) -> Result<MidiInput, MidiError> {
    MidiInput::new(client_name).map_err(|e| MidiError::Backend(e.to_string()))
}

/// Ports keyed by name rather than index so ids survive hot-plug reordering.
fn enumerate(midi_in: &MidiInput) -> Vec<(MidiInputDevice, MidiInputPort)> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut list = Vec::new();
    for port in midi_in.ports() {
        let name = midi_in
            .port_name(&port)
            .unwrap_or_else(|_| "Unknown Input".to_string());
        let occurrence = seen.entry(name.clone()).or_insert(0);
        let id = if *occurrence == 0 {
            DeviceId(format!("midir:{}", name))
        } else {
            DeviceId(format!("midir:{}#{}", name, occurrence))
        };
        *occurrence += 1;
        list.push((MidiInputDevice { id, name }, port));
    }
    list
}

#[derive(Default)]
struct Shared {
    connections: Mutex<HashMap<DeviceId, MidiInputConnection<MidiMessageHandler>>>,
    state_handler: Mutex<Option<StateChangeHandler>>,
    known: Mutex<Vec<MidiInputDevice>>,
}

impl Shared {
    fn notify(&self, device: MidiInputDevice, state: PortState) {
        let handler = self.state_handler.lock().clone();
        if let Some(handler) = handler {
            handler(PortStateChange { device, state });
        }
    }

    /// Diff the live port list against the last snapshot and report changes.
    fn rescan(&self, current: Vec<MidiInputDevice>) {
        let previous = std::mem::replace(&mut *self.known.lock(), current.clone());

        for device in previous.iter().filter(|d| !current.contains(d)) {
            if let Some(connection) = self.connections.lock().remove(&device.id) {
                connection.close();
            }
            self.notify(device.clone(), PortState::Disconnected);
        }
        for device in current.iter().filter(|d| !previous.contains(d)) {
            self.notify(device.clone(), PortState::Connected);
        }
    }
}

pub struct MidirMidiAccess {
    client_name: String,
    shared: Arc<Shared>,
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl MidirMidiAccess {
    fn open(client_name: String, poll_interval: Duration) -> Result<Self, MidiError> {
        let midi_in = create_midi_in(&client_name)?;
        let shared = Arc::new(Shared::default());
        *shared.known.lock() = enumerate(&midi_in)
            .into_iter()
            .map(|(device, _)| device)
            .collect();

        drop(midi_in);

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let watcher = Arc::clone(&shared);
        let watcher_name = format!("{client_name}-watch");
        let join_handle = thread::spawn(move || {
            let midi_in = match create_midi_in(&watcher_name) {
                Ok(midi_in) => midi_in,
                Err(err) => {
                    log::warn!("midir: hot-plug watcher disabled: {err}");
                    return;
                }
            };
            while let Err(mpsc::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(poll_interval) {
                let current = enumerate(&midi_in)
                    .into_iter()
                    .map(|(device, _)| device)
                    .collect();
                watcher.rescan(current);
            }
        });

        Ok(Self {
            client_name,
            shared,
            stop_tx,
            join_handle: Some(join_handle),
        })
    }
}

impl MidiAccess for MidirMidiAccess {
    fn inputs(&self) -> Vec<MidiInputDevice> {
        self.shared.known.lock().clone()
    }

    fn bind_input(&self, device_id: &DeviceId, handler: MidiMessageHandler) -> Result<(), MidiError> {
        let mut midi_in = create_midi_in(&self.client_name)?;
        midi_in.ignore(Ignore::None);

        let port = enumerate(&midi_in)
            .into_iter()
            .find(|(device, _)| &device.id == device_id)
            .map(|(_, port)| port)
            .ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;

        let connection = midi_in
            .connect(
                &port,
                "sightread-midi-input",
                move |_stamp, message, handler| {
                    (handler)(message);
                },
                handler,
            )
            .map_err(|e| MidiError::Backend(e.to_string()))?;

        if let Some(old) = self
            .shared
            .connections
            .lock()
            .insert(device_id.clone(), connection)
        {
            old.close();
        }
        Ok(())
    }

    fn set_state_change_handler(&self, handler: StateChangeHandler) {
        *self.shared.state_handler.lock() = Some(handler);
    }

    fn unbind_all(&self) {
        let connections: Vec<_> = self.shared.connections.lock().drain().collect();
        for (_, connection) in connections {
            connection.close();
        }
        *self.shared.state_handler.lock() = None;
    }
}

impl Drop for MidirMidiAccess {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
        self.unbind_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> MidiInputDevice {
        MidiInputDevice {
            id: DeviceId(format!("midir:{name}")),
            name: name.to_string(),
        }
    }

    #[test]
    fn rescan_reports_removed_then_added_ports() {
        let shared = Shared::default();
        *shared.known.lock() = vec![device("Keys"), device("Pads")];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        *shared.state_handler.lock() = Some(Arc::new(move |change: PortStateChange| {
            sink.lock().push((change.device.name, change.state));
        }));

        shared.rescan(vec![device("Keys"), device("Drums")]);

        assert_eq!(
            *seen.lock(),
            vec![
                ("Pads".to_string(), PortState::Disconnected),
                ("Drums".to_string(), PortState::Connected),
            ]
        );
        assert_eq!(shared.known.lock().len(), 2);
    }

    #[test]
    fn rescan_without_changes_is_silent() {
        let shared = Shared::default();
        *shared.known.lock() = vec![device("Keys")];
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        *shared.state_handler.lock() = Some(Arc::new(move |_: PortStateChange| {
            *sink.lock() += 1;
        }));

        shared.rescan(vec![device("Keys")]);
        assert_eq!(*seen.lock(), 0);
    }
}

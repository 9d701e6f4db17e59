use sightread_ports::audio::AudioError;
use sightread_ports::coach::CoachError;
use sightread_ports::midi::MidiError;
use sightread_ports::storage::StorageError;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("midi error: {0}")]
    Midi(#[from] MidiError),
    #[error("coach error: {0}")]
    Coach(#[from] CoachError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

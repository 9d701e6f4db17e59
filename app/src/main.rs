use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sightread_core::{
    random_sequence, AdaptiveHints, CoreError, HintsConfig, Judgement, MidiInputEngine,
    PitchConfig, PitchDetector, PracticeSession,
};
use sightread_infra_audio_cpal::CpalAudioCapturePort;
use sightread_infra_midi_midir::MidirMidiAccessPort;
use sightread_infra_storage_fs::FsStorage;
use sightread_ports::audio::AudioCapturePort;
use sightread_ports::clock::SystemClock;
use sightread_ports::coach::OfflineCoach;
use sightread_ports::midi::{MidiAccess, MidiAccessPort, MidiError};
use sightread_ports::storage::{SettingsDto, StoragePort};
use sightread_ports::types::{Clef, DeviceId, Lang, MidiInputDevice};
use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const CLIENT_NAME: &str = "SightRead";
const ANY_MIDI_DEVICE: &str = "any";
const PITCH_POLL: Duration = Duration::from_millis(33);
const HINT_POLL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "sightread-cli", about = "Sight-reading practice from the terminal")]
struct Cli {
    /// Hint language for this run (defaults to the saved setting)
    #[arg(long, global = true)]
    lang: Option<LangArg>,
    /// Clef sent with coach requests (defaults to the saved setting)
    #[arg(long, global = true)]
    clef: Option<ClefArg>,
    /// MIDI input id (from `devices`) to listen to from now on, or `any`
    #[arg(long, global = true)]
    midi_device: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List MIDI and audio inputs
    Devices,
    /// Print the detected pitch from the microphone
    Pitch {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        /// Audio input id as printed by `devices`
        #[arg(long)]
        device: Option<String>,
    },
    /// Print note and connection events from MIDI inputs until EOF on stdin
    Midi,
    /// Play a random note drill on a MIDI keyboard
    Drill {
        #[arg(long, default_value_t = 20)]
        notes: usize,
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u8).range(0..=127))]
        low: u8,
        #[arg(long, default_value_t = 72, value_parser = clap::value_parser!(u8).range(0..=127))]
        high: u8,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LangArg {
    En,
    Es,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ClefArg {
    Treble,
    Bass,
}

impl From<LangArg> for Lang {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::En => Lang::En,
            LangArg::Es => Lang::Es,
        }
    }
}

impl From<ClefArg> for Clef {
    fn from(value: ClefArg) -> Self {
        match value {
            ClefArg::Treble => Clef::Treble,
            ClefArg::Bass => Clef::Bass,
        }
    }
}

enum MidiEvent {
    NoteOn(u8),
    NoteOff(u8),
    Connection(bool),
    Quit,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let storage = FsStorage::default();
    let mut saved = load_settings(&storage);
    if let Some(choice) = cli.midi_device.as_deref() {
        remember_midi_device(&storage, &mut saved, choice)
            .context("saving the MIDI input choice")?;
    }
    let settings = apply_overrides(saved, &cli);

    match cli.command {
        Commands::Devices => run_devices(),
        Commands::Pitch { seconds, device } => {
            let device = device.map(DeviceId).or(settings.selected_audio_in.clone());
            run_pitch(device, Duration::from_secs(seconds))
        }
        Commands::Midi => run_midi(&settings),
        Commands::Drill { notes, low, high } => run_drill(&settings, notes, low, high),
    }
}

/// Persist the MIDI input choice; run-only overrides never reach the file.
fn remember_midi_device(
    storage: &dyn StoragePort,
    saved: &mut SettingsDto,
    choice: &str,
) -> Result<(), CoreError> {
    saved.selected_midi_in = midi_device_choice(choice);
    storage.save_settings(saved)?;
    log::info!("midi input set to {choice}");
    Ok(())
}

fn midi_device_choice(choice: &str) -> Option<DeviceId> {
    if choice.eq_ignore_ascii_case(ANY_MIDI_DEVICE) {
        None
    } else {
        Some(DeviceId(choice.to_string()))
    }
}

fn load_settings(storage: &dyn StoragePort) -> SettingsDto {
    match storage.load_settings().map_err(CoreError::from) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("{err}; using default settings");
            SettingsDto::default()
        }
    }
}

fn apply_overrides(mut settings: SettingsDto, cli: &Cli) -> SettingsDto {
    if let Some(lang) = cli.lang {
        settings.lang = lang.into();
    }
    if let Some(clef) = cli.clef {
        settings.clef = clef.into();
    }
    settings
}

fn run_devices() -> Result<()> {
    println!("MIDI inputs:");
    match midi_inputs() {
        Ok(inputs) if inputs.is_empty() => println!("  (none)"),
        Ok(inputs) => {
            for input in inputs {
                println!("  {}  {}", input.id, input.name);
            }
        }
        Err(err) => println!("  unavailable: {err}"),
    }

    println!("Audio inputs:");
    let audio = CpalAudioCapturePort::default()
        .list_inputs()
        .map_err(CoreError::from)
        .context("listing audio inputs")?;
    if audio.is_empty() {
        println!("  (none)");
    }
    for input in audio {
        println!(
            "  {}  {} ({} Hz)",
            input.id, input.name, input.default_sample_rate_hz
        );
    }
    Ok(())
}

fn midi_inputs() -> Result<Vec<MidiInputDevice>, MidiError> {
    let port = MidirMidiAccessPort::new(CLIENT_NAME);
    if !port.is_supported() {
        return Err(MidiError::Unsupported);
    }
    let (tx, rx) = mpsc::channel();
    port.request_access(Box::new(move |result| {
        let _ = tx.send(result);
    }));
    let access = rx
        .recv()
        .map_err(|_| MidiError::Backend("access request dropped".to_string()))??;
    let inputs = access.inputs();
    access.unbind_all();
    Ok(inputs)
}

fn run_pitch(device: Option<DeviceId>, duration: Duration) -> Result<()> {
    let detector = PitchDetector::new(
        Box::new(CpalAudioCapturePort::default()),
        PitchConfig {
            device_id: device,
            ..PitchConfig::default()
        },
    );
    detector
        .start()
        .map_err(CoreError::from)
        .context("starting pitch detection")?;

    let deadline = Instant::now() + duration;
    let mut last: Option<u8> = None;
    while Instant::now() < deadline {
        let current = detector.get_pitch();
        let midi = current.as_ref().map(|note| note.midi);
        if midi != last {
            match current {
                Some(note) => println!(
                    "{}{}  midi {}  {:.1} Hz",
                    note.name, note.octave, note.midi, note.frequency
                ),
                None => println!("-"),
            }
            last = midi;
        }
        thread::sleep(PITCH_POLL);
    }
    detector.stop();
    Ok(())
}

fn start_midi(tx: &mpsc::Sender<MidiEvent>, settings: &SettingsDto) -> MidiInputEngine {
    let engine = MidiInputEngine::new(Box::new(MidirMidiAccessPort::new(CLIENT_NAME)));
    if let Some(device) = &settings.selected_midi_in {
        println!("Listening to {device} only (--midi-device any to reset)");
    }
    engine.select_input(settings.selected_midi_in.clone());
    let on = tx.clone();
    let off = tx.clone();
    let conn = tx.clone();
    engine.initialize(
        Arc::new(move |midi: u8| {
            let _ = on.send(MidiEvent::NoteOn(midi));
        }),
        Some(Arc::new(move |connected: bool| {
            let _ = conn.send(MidiEvent::Connection(connected));
        })),
        Some(Arc::new(move |midi: u8| {
            let _ = off.send(MidiEvent::NoteOff(midi));
        })),
    );
    engine
}

fn watch_stdin(tx: mpsc::Sender<MidiEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() {
                break;
            }
        }
        let _ = tx.send(MidiEvent::Quit);
    });
}

fn run_midi(settings: &SettingsDto) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let engine = start_midi(&tx, settings);
    watch_stdin(tx);
    println!("Listening for MIDI input, Ctrl-D to quit");

    for event in rx {
        match event {
            MidiEvent::NoteOn(midi) => println!("note on  {midi}"),
            MidiEvent::NoteOff(midi) => println!("note off {midi}"),
            MidiEvent::Connection(true) => println!("keyboard connected"),
            MidiEvent::Connection(false) => println!("keyboard disconnected"),
            MidiEvent::Quit => break,
        }
    }
    engine.shutdown();
    Ok(())
}

fn run_drill(settings: &SettingsDto, notes: usize, low: u8, high: u8) -> Result<()> {
    let hints = Arc::new(AdaptiveHints::new(
        Arc::new(OfflineCoach),
        Arc::new(SystemClock::new()),
        HintsConfig::from_settings(settings),
    ));
    let mut rng = StdRng::from_entropy();
    let mut session = PracticeSession::new(
        random_sequence(&mut rng, notes, low, high),
        Arc::clone(&hints),
    );

    let (tx, rx) = mpsc::channel();
    let engine = start_midi(&tx, settings);
    watch_stdin(tx);
    prompt(&session);

    let mut shown_hint = None;
    while !session.is_finished() {
        match rx.recv_timeout(HINT_POLL) {
            Ok(MidiEvent::NoteOn(midi)) => {
                match session.play(midi) {
                    Judgement::Correct { note, streak } => {
                        println!("  {}{} correct (streak {streak})", note.name, note.octave)
                    }
                    Judgement::Mistake { expected, played } => println!(
                        "  played {}{}, expected {}{}",
                        played.name, played.octave, expected.name, expected.octave
                    ),
                    Judgement::Finished => {}
                }
                prompt(&session);
            }
            Ok(MidiEvent::Connection(connected)) => {
                log::info!("drill: keyboard connected={connected}")
            }
            Ok(MidiEvent::NoteOff(_)) | Err(mpsc::RecvTimeoutError::Timeout) => {}
            Ok(MidiEvent::Quit) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        hints.poll();
        let hint = hints.current_hint();
        let id = hint.as_ref().map(|h| h.id);
        if id != shown_hint {
            if let Some(hint) = hint {
                println!("  hint: {}", hint.text);
            }
            shown_hint = id;
        }
    }

    engine.shutdown();
    hints.shutdown();
    println!(
        "Done: {} correct, {} mistakes",
        session.correct(),
        session.mistakes()
    );
    for confusion in hints.top_confusions(3) {
        println!(
            "  confused {} and {} x{}",
            confusion.note_a, confusion.note_b, confusion.count
        );
    }
    Ok(())
}

fn prompt(session: &PracticeSession) {
    if let Some(note) = session.current() {
        println!("Play {}{}", note.name, note.octave);
    }
}

//! Soundboard controller
//!
//! The single entry point a frontend drives. Owns the device list, the
//! persisted settings, the clip library, the mic capture stream, and the
//! output sinks, and translates UI actions into lock-free engine commands.
//!
//! The controller expects to be polled (see [`Soundboard::poll`]) from the
//! UI loop; background clip decodes land in the library and notifications
//! fan out through a crossbeam channel that any number of views can
//! subscribe to.

use std::path::PathBuf;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::audio::config::{DeviceId, DeviceRole};
use crate::audio::device::{list_devices, DeviceList};
use crate::audio::error::AudioResult;
use crate::audio::input::MicCapture;
use crate::audio::output::SinkManager;
use crate::config::{paths, Settings};
use crate::engine::{CommandSender, DistortionStage, EngineCommand, ToneKind, Voice};
use crate::library::{ClipLibrary, ClipSummary, LibraryEvent};
use crate::types::SAMPLE_RATE;

/// Pitch multiplier bounds for clip playback
const MIN_PITCH: f64 = 0.25;
const MAX_PITCH: f64 = 4.0;

/// Events pushed to subscribed frontends
#[derive(Debug, Clone)]
pub enum Notification {
    ClipListChanged(Vec<ClipSummary>),
    DeviceListChanged,
    SinkWarning(String),
    ClipLoadFailed { name: String, reason: String },
}

/// Top-level soundboard state
pub struct Soundboard {
    settings: Settings,
    settings_path: PathBuf,
    devices: DeviceList,
    library: ClipLibrary,
    sinks: SinkManager,
    commands: CommandSender,
    mic: Option<MicCapture>,
    /// Ids of voices the engine has retired, drained on poll
    reclaim_rx: rtrb::Consumer<u64>,
    /// Playback rate multiplier applied to newly started voices
    pitch: f64,
    distortion_amount: f32,
    notify_tx: Sender<Notification>,
    notify_rx: Receiver<Notification>,
}

impl Soundboard {
    /// Create a soundboard using the default config locations
    pub fn new() -> Self {
        Self::with_paths(paths::settings_path(), Some(paths::clips_path()))
    }

    /// Create a soundboard with explicit config paths (tests use this)
    ///
    /// Construction never fails: an environment with no enumerable audio
    /// devices yields empty device lists and a warning notification, and
    /// every device-specific operation degrades from there.
    pub fn with_paths(settings_path: PathBuf, clips_path: Option<PathBuf>) -> Self {
        let settings = Settings::load_from(&settings_path);
        let (notify_tx, notify_rx) = unbounded();
        let devices = enumerate_or_empty(&notify_tx);
        let (sinks, commands, reclaim_rx) = SinkManager::new(SAMPLE_RATE);
        let mut library = ClipLibrary::new(clips_path);
        library.load_persisted();

        let mut board = Self {
            settings,
            settings_path,
            devices,
            library,
            sinks,
            commands,
            mic: None,
            reclaim_rx,
            pitch: 1.0,
            distortion_amount: 0.0,
            notify_tx,
            notify_rx,
        };
        board.bind_persisted_sinks();
        board
    }

    /// Bind the virtual sink from persisted settings, falling back to the
    /// default device when the remembered one is gone
    fn bind_persisted_sinks(&mut self) {
        let remembered = self.settings.device_for(DeviceRole::VirtualOutput).cloned();
        let selection = remembered.filter(|id| {
            if self.devices.contains_output(id) {
                true
            } else {
                log::warn!(
                    "Remembered virtual output {} is gone, using default",
                    id.display_label()
                );
                false
            }
        });
        match self.sinks.set_virtual_device(selection.as_ref()) {
            Ok(Some(warning)) => self.notify(Notification::SinkWarning(warning)),
            Ok(None) => {}
            Err(e) => {
                log::error!("Failed to bind virtual sink at startup: {}", e);
                self.notify(Notification::SinkWarning(format!(
                    "virtual sink unavailable: {}",
                    e
                )));
            }
        }
    }

    fn notify(&self, notification: Notification) {
        let _ = self.notify_tx.send(notification);
    }

    /// Subscribe to controller notifications
    pub fn subscribe(&self) -> Receiver<Notification> {
        self.notify_rx.clone()
    }

    // ─── Devices ────────────────────────────────────────────────────────

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    /// Re-enumerate audio devices (hotplug) and re-apply persisted
    /// selections, preserving ones that are still present
    ///
    /// Enumeration failure leaves empty lists and a warning; it is never
    /// fatal.
    pub fn refresh_devices(&mut self) {
        self.devices = enumerate_or_empty(&self.notify_tx);
        self.notify(Notification::DeviceListChanged);

        self.bind_persisted_sinks();
        if self.sinks.monitoring_enabled() {
            let device = self
                .settings
                .device_for(DeviceRole::MonitorOutput)
                .cloned();
            match self.sinks.set_monitoring(true, device.as_ref()) {
                Ok(Some(warning)) => self.notify(Notification::SinkWarning(warning)),
                Ok(None) => {}
                Err(e) => {
                    log::error!("Failed to rebind monitor sink: {}", e);
                    self.notify(Notification::SinkWarning(format!(
                        "monitor sink unavailable: {}",
                        e
                    )));
                }
            }
        }
    }

    /// The persisted device selection for a role, if it is still enumerable
    ///
    /// A remembered device that has since disappeared yields None; callers
    /// fall back to the host default the same way the sinks do.
    pub fn selected_device(&self, role: DeviceRole) -> Option<&DeviceId> {
        let id = self.settings.device_for(role)?;
        let present = match role {
            DeviceRole::Input => self.devices.contains_input(id),
            DeviceRole::VirtualOutput | DeviceRole::MonitorOutput => {
                self.devices.contains_output(id)
            }
        };
        present.then_some(id)
    }

    /// Choose the virtual output device and persist the choice
    pub fn set_virtual_output_device(&mut self, id: Option<DeviceId>) -> AudioResult<()> {
        let warning = self.sinks.set_virtual_device(id.as_ref())?;
        self.settings
            .set_device_for(DeviceRole::VirtualOutput, id);
        self.save_settings();
        if let Some(warning) = warning {
            self.notify(Notification::SinkWarning(warning));
        }
        Ok(())
    }

    /// Choose the monitor output device and persist the choice
    ///
    /// Takes effect immediately when monitoring is on; otherwise it is just
    /// remembered for the next enable.
    pub fn set_monitor_output_device(&mut self, id: Option<DeviceId>) -> AudioResult<()> {
        self.settings
            .set_device_for(DeviceRole::MonitorOutput, id.clone());
        self.save_settings();
        if self.sinks.monitoring_enabled() {
            let warning = self.sinks.set_monitoring(true, id.as_ref())?;
            if let Some(warning) = warning {
                self.notify(Notification::SinkWarning(warning));
            }
        }
        Ok(())
    }

    /// Toggle local monitoring; the virtual sink is unaffected
    pub fn set_monitoring_enabled(&mut self, enabled: bool) -> AudioResult<()> {
        let device = self
            .settings
            .device_for(DeviceRole::MonitorOutput)
            .cloned();
        let warning = self.sinks.set_monitoring(enabled, device.as_ref())?;
        if let Some(warning) = warning {
            self.notify(Notification::SinkWarning(warning));
        }
        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.sinks.monitoring_enabled()
    }

    // ─── Microphone ─────────────────────────────────────────────────────

    /// Start capturing the microphone into the mix
    ///
    /// Replaces any running capture. The selection is persisted.
    pub fn start_mic(&mut self, id: Option<DeviceId>) -> AudioResult<()> {
        self.stop_mic();

        let (capture, consumer) = MicCapture::start(id.as_ref(), self.sinks.sample_rate())?;
        log::info!("Mic capture started on {}", capture.device_label());

        self.send_command(EngineCommand::AttachMic(Box::new(consumer)));
        self.mic = Some(capture);
        self.settings.set_device_for(DeviceRole::Input, id);
        self.save_settings();
        Ok(())
    }

    /// Stop capturing the microphone
    pub fn stop_mic(&mut self) {
        if self.mic.take().is_some() {
            self.send_command(EngineCommand::DetachMic);
        }
    }

    pub fn mic_active(&self) -> bool {
        self.mic.is_some()
    }

    // ─── Clips ──────────────────────────────────────────────────────────

    /// Queue audio bytes for background decoding into the library
    pub fn load_clip_bytes(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.library.load_bytes(name, bytes);
    }

    /// Drive background work; call once per UI frame
    ///
    /// Drains retired-voice ids from the engine (so voice tracking shrinks
    /// when playback completes naturally) and finished clip decodes from
    /// the library.
    pub fn poll(&mut self) {
        while let Ok(voice_id) = self.reclaim_rx.pop() {
            self.library.end_voice(voice_id);
        }
        for event in self.library.poll() {
            match event {
                LibraryEvent::ClipAdded(_) => {
                    self.notify(Notification::ClipListChanged(self.library.summaries()));
                }
                LibraryEvent::LoadFailed { name, reason } => {
                    self.notify(Notification::ClipLoadFailed { name, reason });
                }
            }
        }
    }

    pub fn clips(&self) -> Vec<ClipSummary> {
        self.library.summaries()
    }

    /// Remove a clip; voices already playing it finish naturally
    pub fn remove_clip(&mut self, clip_id: u64) {
        if self.library.remove(clip_id) {
            self.notify(Notification::ClipListChanged(self.library.summaries()));
        }
    }

    /// Start a one-shot voice for a clip at the current pitch multiplier;
    /// returns the voice id
    pub fn play_clip(&mut self, clip_id: u64) -> AudioResult<u64> {
        self.play_clip_at(clip_id, self.pitch)
    }

    /// Start a one-shot voice at an explicit pitch multiplier
    ///
    /// The effective voice rate folds the clip's native sample rate into
    /// the engine rate, scaled by the multiplier.
    pub fn play_clip_at(&mut self, clip_id: u64, pitch: f64) -> AudioResult<u64> {
        let (voice_id, samples, clip_rate) = self.library.begin_voice(clip_id)?;
        let rate = pitch * clip_rate as f64 / self.sinks.sample_rate() as f64;
        let voice = Voice::new(voice_id, samples, rate);
        self.send_command(EngineCommand::PlayVoice(Box::new(voice)));
        Ok(voice_id)
    }

    /// Stop a single voice; stale ids are ignored
    pub fn stop_voice(&mut self, voice_id: u64) {
        self.library.end_voice(voice_id);
        self.send_command(EngineCommand::StopVoice { voice_id });
    }

    /// The clip a live voice is playing; stale voice ids are an error
    pub fn voice_clip(&self, voice_id: u64) -> AudioResult<u64> {
        self.library.clip_for_voice(voice_id)
    }

    // ─── Tones and processing ───────────────────────────────────────────

    /// Hold a synthesized tone; ignored while another tone is held
    pub fn start_tone(&mut self, kind: ToneKind) {
        self.send_command(EngineCommand::StartTone(kind));
    }

    pub fn stop_tone(&mut self) {
        self.send_command(EngineCommand::StopTone);
    }

    /// Master gain in percent, 0-500
    pub fn set_master_gain(&mut self, percent: f32) {
        self.send_command(EngineCommand::SetMasterGain { percent });
    }

    /// Pitch multiplier for newly started voices (clamped to 0.25-4.0)
    pub fn set_pitch(&mut self, pitch: f64) {
        self.pitch = if pitch.is_finite() {
            pitch.clamp(MIN_PITCH, MAX_PITCH)
        } else {
            1.0
        };
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Set the distortion amount; zero or less disables the stage
    ///
    /// The transfer curve is rebuilt here, off the audio thread, and swapped
    /// in with a single command.
    pub fn set_distortion_amount(&mut self, amount: f32) {
        self.distortion_amount = amount.max(0.0);
        let stage = if self.distortion_amount > 0.0 {
            Some(Box::new(DistortionStage::new(self.distortion_amount)))
        } else {
            None
        };
        self.send_command(EngineCommand::SetDistortion(stage));
    }

    pub fn distortion_amount(&self) -> f32 {
        self.distortion_amount
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn send_command(&mut self, cmd: EngineCommand) {
        if self.commands.send(cmd).is_err() {
            // 256 queued commands means the audio callback is not running
            // or badly stalled
            log::warn!("Engine command queue full, dropping command");
        }
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save_to(&self.settings_path) {
            log::error!("Failed to save settings: {}", e);
        }
    }
}

/// Enumerate devices, degrading to empty lists on failure
fn enumerate_or_empty(notify_tx: &Sender<Notification>) -> DeviceList {
    match list_devices() {
        Ok(list) => list,
        Err(e) => {
            log::warn!("Device enumeration failed: {}", e);
            let _ = notify_tx.send(Notification::SinkWarning(format!(
                "device enumeration failed: {}",
                e
            )));
            DeviceList::default()
        }
    }
}

//! Lock-free command queue for real-time engine control
//!
//! The UI thread sends commands via a lock-free SPSC ringbuffer and the audio
//! thread applies them at buffer boundaries. A mutex here would risk audible
//! dropouts: a failed `try_lock()` in the callback means a buffer of silence.
//! With `rtrb`, push and pop are wait-free and allocation-free.
//!
//! Large payloads (decoded clip handles, distortion curves, the mic sample
//! queue) are boxed so the command enum itself stays pointer-sized and
//! cache-friendly in the ring buffer.

use crate::types::StereoSample;

use super::distortion::DistortionStage;
use super::tone::ToneKind;
use super::voice::Voice;

/// Commands sent from the UI thread to the audio thread
pub enum EngineCommand {
    /// Set master gain from a percent value (0-500, i.e. 0%-500%)
    SetMasterGain { percent: f32 },
    /// Start a prepared one-shot playback voice
    ///
    /// The voice is built off the audio thread (clip handle resolved, rate
    /// computed) and boxed to keep the enum small.
    PlayVoice(Box<Voice>),
    /// Stop an in-flight voice; stale ids are no-ops
    StopVoice { voice_id: u64 },
    /// Start a synthesized tone (ignored while another tone is sounding)
    StartTone(ToneKind),
    /// Stop the active tone, if any
    StopTone,
    /// Swap the distortion stage (None removes it)
    ///
    /// The replacement curve is fully built before this command is sent, so
    /// the swap is one atomic step on the audio thread.
    SetDistortion(Option<Box<DistortionStage>>),
    /// Wire a live mic capture queue into the mix bus
    AttachMic(Box<rtrb::Consumer<StereoSample>>),
    /// Disconnect the mic capture queue
    DetachMic,
}

/// Capacity of the command queue
///
/// Commands are small and bursts are short (a slider drag emits a few dozen
/// per second at most); 256 leaves ample headroom.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// The producer side is owned by the UI thread, the consumer side by the
/// audio thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Command sender for the UI thread
///
/// Wraps the lock-free producer for sending [`EngineCommand`] to the audio
/// thread. All operations are non-blocking.
pub struct CommandSender {
    pub(crate) producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Send a command to the engine (non-blocking)
    ///
    /// Returns `Err(cmd)` with the command handed back if the queue is full.
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }
}

//! # Recording HAL
//!
//! An in-memory implementation of [`VideoHal`] and [`AudioHal`] that
//! records every side effect instead of performing it. Hosted tests
//! drive the same interrupt handlers and lifecycle code that runs on
//! hardware, then assert on the recorded sequence.
//!
//! ```ignore
//! let mut hal = SimHal::new();
//! driver.on_line_interrupt(&mut hal, ...);
//! assert_eq!(hal.vsync_asserts, 1);
//! ```

use alloc::vec::Vec;

use crate::clock::ClockProgram;
use crate::dma::{OutputChannel, TransferDescriptor};
use crate::hal::{AudioHal, VideoHal};
use crate::mode::VideoMode;
use crate::VgaError;

/// Records every HAL call. All fields are public so tests can assert
/// on them directly.
#[derive(Debug, Default)]
pub struct SimHal {
    /// Every PLL program written, in order.
    pub pll_programs: Vec<ClockProgram>,
    /// When set, `program_pll` reports a lock timeout.
    pub fail_lock: bool,
    /// Last mode passed to `configure_output`.
    pub configured_mode: Option<VideoMode>,
    pub timer_running: bool,
    /// Current vsync output level.
    pub vsync_level: bool,
    /// Rising-edge count of the vsync output.
    pub vsync_asserts: u32,
    pub line_flag_clears: u32,
    pub descriptor_installs: Vec<(OutputChannel, TransferDescriptor)>,
    pub source_writes: Vec<(OutputChannel, usize)>,
    pub arms: Vec<OutputChannel>,
    pub disarms: Vec<OutputChannel>,
    /// `(addr, len)` of every cache writeback.
    pub flushes: Vec<(usize, usize)>,
    pub output_shutdowns: u32,

    pub audio_sample_rate: Option<u32>,
    pub samples: Vec<i16>,
    pub refill_pends: u32,
    pub audio_flushes: Vec<(usize, usize)>,
    pub audio_shutdowns: u32,
}

impl SimHal {
    pub fn new() -> SimHal {
        SimHal::default()
    }
}

impl VideoHal for SimHal {
    fn program_pll(&mut self, program: &ClockProgram) -> Result<(), VgaError> {
        self.pll_programs.push(*program);
        if self.fail_lock {
            return Err(VgaError::ClockLockTimeout);
        }
        Ok(())
    }

    fn configure_output(&mut self, mode: &VideoMode) {
        self.configured_mode = Some(*mode);
    }

    fn start_line_timer(&mut self) {
        self.timer_running = true;
    }

    fn clear_line_flags(&mut self) {
        self.line_flag_clears += 1;
    }

    fn set_vsync(&mut self, asserted: bool) {
        if asserted && !self.vsync_level {
            self.vsync_asserts += 1;
        }
        self.vsync_level = asserted;
    }

    fn install_descriptor(&mut self, channel: OutputChannel, desc: &TransferDescriptor) {
        self.descriptor_installs.push((channel, *desc));
    }

    fn set_source(&mut self, channel: OutputChannel, addr: usize) {
        self.source_writes.push((channel, addr));
    }

    fn arm(&mut self, channel: OutputChannel) {
        self.arms.push(channel);
    }

    fn disarm(&mut self, channel: OutputChannel) {
        self.disarms.push(channel);
    }

    fn flush_range(&mut self, addr: usize, len: usize) {
        self.flushes.push((addr, len));
    }

    fn shutdown_output(&mut self) {
        self.timer_running = false;
        self.output_shutdowns += 1;
    }
}

impl AudioHal for SimHal {
    fn configure_audio(&mut self, sample_rate_hz: u32) {
        self.audio_sample_rate = Some(sample_rate_hz);
    }

    fn push_sample(&mut self, sample: i16) {
        self.samples.push(sample);
    }

    fn pend_refill(&mut self) {
        self.refill_pends += 1;
    }

    fn flush_audio_range(&mut self, addr: usize, len: usize) {
        self.audio_flushes.push((addr, len));
    }

    fn shutdown_audio(&mut self) {
        self.audio_shutdowns += 1;
    }
}

//! # Hardware abstraction seams
//!
//! The driver core never touches a register directly; every side effect
//! it needs is a method here. [`crate::hw::HwVideoHal`] implements these
//! against the real i.MX RT1062 peripherals, [`crate::sim::SimHal`]
//! records them in memory for deterministic hosted tests.
//!
//! Methods compile down to one or two register writes each on the real
//! implementation; the trait adds no abstraction cost beyond what the
//! optimizer inlines away.

use crate::clock::ClockProgram;
use crate::dma::{OutputChannel, TransferDescriptor};
use crate::mode::VideoMode;
use crate::VgaError;

/// Side effects of the scanout path.
pub trait VideoHal {
    /// Write a PLL program and wait (bounded) for the lock bit.
    fn program_pll(&mut self, program: &ClockProgram) -> Result<(), VgaError>;

    /// Gate clocks and configure shifters, shift timer, and the line
    /// timer for the resolved mode. Does not start anything.
    fn configure_output(&mut self, mode: &VideoMode);

    /// Start the free-running line timer; the hsync waveform and the
    /// per-line compare interrupt begin immediately.
    fn start_line_timer(&mut self);

    /// Acknowledge the line timer's pending compare flags.
    fn clear_line_flags(&mut self);

    /// Drive the vertical sync output. `asserted` is the sync-active
    /// state; the pin polarity is the implementation's concern.
    fn set_vsync(&mut self, asserted: bool);

    /// Install a channel's transfer descriptor (everything but the
    /// per-line source address).
    fn install_descriptor(&mut self, channel: OutputChannel, desc: &TransferDescriptor);

    /// Point a channel at its next line start.
    fn set_source(&mut self, channel: OutputChannel, addr: usize);

    /// Allow the channel to respond to shifter requests again.
    fn arm(&mut self, channel: OutputChannel);

    /// Stop the channel responding to requests.
    fn disarm(&mut self, channel: OutputChannel);

    /// Write back the cache over `[addr, addr+len)` so the DMA engine
    /// observes the CPU's latest writes to that line.
    fn flush_range(&mut self, addr: usize, len: usize);

    /// Undo `configure_output`: stop the timer, disable requests, and
    /// gate the peripheral clocks back off.
    fn shutdown_output(&mut self);
}

/// Side effects of the audio sample pump.
pub trait AudioHal {
    /// Bring up the audio interface at the given sample rate and start
    /// sample-drain interrupts.
    fn configure_audio(&mut self, sample_rate_hz: u32);

    /// Feed one sample to the transmit register.
    fn push_sample(&mut self, sample: i16);

    /// Pend the low-priority refill interrupt.
    fn pend_refill(&mut self);

    /// Write back the cache over a freshly refilled buffer half.
    fn flush_audio_range(&mut self, addr: usize, len: usize);

    /// Stop sample interrupts and gate the audio interface off.
    fn shutdown_audio(&mut self);
}

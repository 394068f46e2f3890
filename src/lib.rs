//! # vga-scanout
//!
//! Generates an analog VGA signal from an i.MX RT1062 with almost no CPU
//! involvement. A QTimer channel shapes the horizontal sync pulse in
//! hardware, two FlexIO shift registers serialize the color bits onto
//! GPIO, and two eDMA channels stream one scanline of the frame buffer
//! into the shifters per horizontal line. The CPU only runs a short
//! per-line interrupt that points the DMA engines at the next row.
//!
//! ## Getting a picture
//!
//! ```ignore
//! let mut video = VideoController::new(unsafe { hw::HwVideoHal::new(VSYNC_PIN_MASK) });
//! video.begin(Mode::Vga640x480)?;
//!
//! loop {
//!     video.wait_for_frame_start();
//!     let fb = video.framebuffer_mut().unwrap();
//!     fb.clear(rgb(0, 0, 64));
//!     fb.set_pixel(10, 10, rgb(255, 255, 255));
//! }
//! ```
//!
//! Drawing code writes through the frame-buffer surface at any time; the
//! scanout side never locks it. Writes that land on the line currently
//! being transmitted may tear for one frame, which is the accepted cost
//! of keeping pixel writes free.
//!
//! ## Hosted testing
//!
//! Nothing in the driver core touches hardware directly: every side
//! effect goes through the [`hal::VideoHal`] trait. [`sim::SimHal`]
//! records those effects in memory, so the whole scanline state machine
//! runs deterministically on a desktop host.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod audio;
pub mod clock;
pub mod controller;
pub mod dma;
pub mod framebuffer;
pub mod hal;
pub mod hw;
pub mod mode;
pub mod scanline;
pub mod sim;

pub use controller::VideoController;
pub use framebuffer::FrameBuffer;
pub use mode::{Mode, VideoMode};

/// Native pixel format: `RRRGGGBB`.
pub type Pixel = u8;

/// Pack 8-bit-per-channel RGB into the native `RRRGGGBB` pixel.
#[inline(always)]
pub const fn rgb(r: u8, g: u8, b: u8) -> Pixel {
    (((r >> 5) & 0x07) << 5) | (((g >> 5) & 0x07) << 2) | ((b >> 6) & 0x03)
}

/// Fatal initialization errors.
///
/// All of these surface synchronously from [`VideoController::begin`];
/// none leave partially-claimed hardware behind, and none are retried
/// automatically. Runtime timing faults (a missed scanline deadline)
/// corrupt at most one line and are never reported.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VgaError {
    /// The requested mode is not in the mode table, or its derived
    /// timing violates a transfer-granularity invariant.
    ModeUnsupported,
    /// The frame (or audio) buffer could not be allocated.
    AllocationFailed,
    /// The video PLL did not report lock within the bounded wait.
    /// No signal is possible without a locked pixel clock.
    ClockLockTimeout,
}

impl core::fmt::Display for VgaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            VgaError::ModeUnsupported => f.write_str("video mode not supported"),
            VgaError::AllocationFailed => f.write_str("buffer allocation failed"),
            VgaError::ClockLockTimeout => f.write_str("video PLL failed to lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_packs_332() {
        assert_eq!(rgb(0, 0, 0), 0b000_00_000);
        assert_eq!(rgb(255, 255, 255), 0xFF);
        assert_eq!(rgb(255, 0, 0), 0b111_00_000);
        assert_eq!(rgb(0, 255, 0), 0b000_11_100);
        assert_eq!(rgb(0, 0, 255), 0b000_00_011);
    }
}

//! # Scanout Controller
//!
//! Owns the whole output path: resolved mode, clock program, frame
//! buffer, DMA pipeline, and scanline state, behind one lifecycle.
//!
//! ```ignore
//! let mut vga = VideoController::new(hal);
//! vga.begin(Mode::Vga320x240)?;
//! vga.wait_for_frame_start();
//! vga.framebuffer_mut().unwrap().clear(rgb(0, 0, 64));
//! // ... later
//! vga.end();
//! ```
//!
//! The platform's line interrupt must call [`on_line_interrupt`] once
//! per scanline; everything else runs at thread priority.
//!
//! [`on_line_interrupt`]: VideoController::on_line_interrupt

use core::sync::atomic::{AtomicU8, Ordering};

use crate::clock::{ClockProgram, FLEXIO_CLOCK_KHZ};
use crate::dma::OutputPipeline;
use crate::framebuffer::FrameBuffer;
use crate::hal::VideoHal;
use crate::mode::{Mode, PixelShift, VideoMode, TOTAL_LINES};
use crate::scanline::ScanlineDriver;
use crate::{Pixel, VgaError};

/// Everything that exists only while output is running.
struct Active {
    mode: VideoMode,
    /// Program the clock was started with; tweaks re-derive from this
    /// so they never accumulate.
    clock: ClockProgram,
    fb: FrameBuffer,
    pipeline: OutputPipeline,
    scanline: ScanlineDriver,
    /// Effective secondary-channel shift in bytes. Written by `tweak`,
    /// read by the line interrupt.
    pix_shift: AtomicU8,
}

pub struct VideoController<H: VideoHal> {
    hal: H,
    state: Option<Active>,
}

impl<H: VideoHal> VideoController<H> {
    pub fn new(hal: H) -> VideoController<H> {
        VideoController { hal, state: None }
    }

    /// Bring up output in `mode`. Resolves timing, synthesizes and
    /// locks the clock, allocates the frame buffer, installs the DMA
    /// descriptors, and starts the line timer, in that order. If output
    /// is already running it is torn down first.
    pub fn begin(&mut self, mode: Mode) -> Result<(), VgaError> {
        if self.state.is_some() {
            self.end();
        }

        let vm = VideoMode::resolve(mode)?;
        let clock = ClockProgram::synthesize(FLEXIO_CLOCK_KHZ)?;
        let fb = FrameBuffer::allocate(&vm)?;

        self.hal.program_pll(&clock)?;
        self.hal.configure_output(&vm);

        let mut pipeline = OutputPipeline::configure(&vm);
        pipeline.install(&mut self.hal);

        log::info!(
            target: "scanout",
            "output up: {}x{} stride {} div {}",
            vm.width,
            vm.height,
            vm.stride,
            vm.clock_div,
        );

        self.state = Some(Active {
            pix_shift: AtomicU8::new(vm.pixel_shift.bytes),
            mode: vm,
            clock,
            fb,
            pipeline,
            scanline: ScanlineDriver::new(),
        });
        self.hal.start_line_timer();
        Ok(())
    }

    /// Stop output and free the frame buffer. Safe to call when output
    /// is not running.
    pub fn end(&mut self) {
        if let Some(active) = self.state.take() {
            active.pipeline.disable(&mut self.hal);
            self.hal.shutdown_output();
            log::info!(target: "scanout", "output down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    pub fn mode(&self) -> Option<&VideoMode> {
        self.state.as_ref().map(|a| &a.mode)
    }

    /// `(width, height)` of the visible window, or `(0, 0)` when output
    /// is not running.
    pub fn frame_size(&self) -> (usize, usize) {
        match &self.state {
            Some(a) => (a.mode.width as usize, a.mode.height as usize),
            None => (0, 0),
        }
    }

    pub fn framebuffer(&self) -> Option<&FrameBuffer> {
        self.state.as_ref().map(|a| &a.fb)
    }

    pub fn framebuffer_mut(&mut self) -> Option<&mut FrameBuffer> {
        self.state.as_mut().map(|a| &mut a.fb)
    }

    /// Raw pointer to row `y`'s first visible pixel, for renderers that
    /// bypass the safe accessors. Null when out of range or stopped.
    pub fn row_pointer(&mut self, y: usize) -> *mut Pixel {
        match self.state.as_mut() {
            Some(a) => a.fb.row_pointer(y),
            None => core::ptr::null_mut(),
        }
    }

    /// The scanline most recently started, or `None` when stopped.
    pub fn current_line(&self) -> Option<u32> {
        self.state.as_ref().map(|a| a.scanline.current_line())
    }

    /// Nudge the picture without restarting output. `shift_delta`
    /// moves the secondary channel's source by whole bytes relative to
    /// the mode default; `num_delta`/`denom_delta` adjust the clock's
    /// fractional part relative to the program `begin` locked. Deltas
    /// are absolute against those references, so repeated calls do not
    /// accumulate.
    pub fn tweak(
        &mut self,
        shift_delta: i8,
        num_delta: i32,
        denom_delta: i32,
    ) -> Result<(), VgaError> {
        let Some(active) = self.state.as_mut() else {
            return Ok(());
        };

        let shift = (active.mode.pixel_shift.bytes as i16 + shift_delta as i16)
            .clamp(0, u8::MAX as i16) as u8;
        active.pix_shift.store(shift, Ordering::Relaxed);

        if num_delta != 0 || denom_delta != 0 {
            let adjusted = active.clock.adjusted(num_delta, denom_delta);
            self.hal.program_pll(&adjusted)?;
        }
        Ok(())
    }

    /// Spin until the raster enters the vertical blanking pulse. The
    /// line interrupt must be running or this never returns.
    pub fn wait_for_frame_start(&self) {
        let Some(active) = self.state.as_ref() else {
            return;
        };
        while active.scanline.frame_started() {
            core::hint::spin_loop();
        }
        while !active.scanline.frame_started() {
            core::hint::spin_loop();
        }
    }

    /// Spin until the raster starts `line`. Values past the frame wrap
    /// modulo the line count, so no request can spin forever.
    pub fn wait_for_line(&self, line: u32) {
        let Some(active) = self.state.as_ref() else {
            return;
        };
        let line = line % TOTAL_LINES;
        while active.scanline.current_line() != line {
            core::hint::spin_loop();
        }
    }

    /// The per-line interrupt entry point. No-op when stopped, so a
    /// straggling timer interrupt during teardown is harmless.
    pub fn on_line_interrupt(&mut self) {
        let Some(active) = self.state.as_mut() else {
            return;
        };
        let shift = PixelShift::new(active.pix_shift.load(Ordering::Relaxed));
        active.scanline.on_line_interrupt(
            &mut self.hal,
            &mut active.pipeline,
            &active.mode,
            active.fb.base_addr(),
            shift,
        );
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }
}

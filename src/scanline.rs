//! # Scanline Driver
//!
//! A QTimer channel free-runs between two compare values in
//! toggle-on-compare mode, shaping the horizontal sync pulse entirely in
//! hardware: one compare ends the sync-low interval, the other ends the
//! line. The second compare raises the interrupt serviced by
//! [`ScanlineDriver::on_line_interrupt`], once per line, 525 lines per
//! frame.
//!
//! The interrupt body has a hard budget of one line period (~31.8 µs).
//! If something higher priority overruns that budget, one line of video
//! is wrong and the next interrupt carries on — a missed deadline here
//! degrades the picture, it is not an error anyone can act on.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::dma::OutputPipeline;
use crate::hal::VideoHal;
use crate::mode::{PixelShift, VideoMode, TOP_BLANKING_LINES, TOTAL_LINES};

/// Compare values for the hsync waveform, in line-timer ticks.
///
/// Derived from the 150 MHz peripheral bus clock (6.7 ns/tick): sync
/// low is 3.813 µs, the whole line 31.78 µs. The 1005/1000 margin was
/// found on real monitors; without it some fail to latch the line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScanlineTiming {
    /// Ticks for the whole line period, sync included.
    pub line_ticks: u16,
    /// Ticks the sync output stays low.
    pub sync_low_ticks: u16,
}

const MARGIN_N: u32 = 1005;
const MARGIN_D: u32 = 1000;

impl ScanlineTiming {
    /// The 31.47 kHz horizontal timing every mode here uses.
    pub const fn vga60() -> ScanlineTiming {
        ScanlineTiming {
            line_ticks: (4174 * MARGIN_N / MARGIN_D - 1) as u16,
            sync_low_ticks: (569 * MARGIN_N / MARGIN_D - 1) as u16,
        }
    }
}

/// Map a raw line number to a visible buffer row, if it is inside the
/// visible window. Line-doubled modes send each row twice.
#[inline(always)]
pub fn visible_row(line: u32, line_double: bool, height: u32) -> Option<u32> {
    let past_top = line.checked_sub(TOP_BLANKING_LINES)?;
    let row = past_top >> (line_double as u32);
    (row < height).then_some(row)
}

/// Per-frame mutable scanout state.
///
/// `line` and `frame_start` are written only from the line interrupt and
/// polled from everywhere else with relaxed loads. A poll that races the
/// interrupt reads a value at most one line stale, which costs one extra
/// poll iteration and nothing else — that benign raciness is the whole
/// synchronization design, and it is what keeps pixel writes free of
/// locks.
#[derive(Debug)]
pub struct ScanlineDriver {
    line: AtomicU32,
    frame_start: AtomicBool,
}

impl ScanlineDriver {
    pub const fn new() -> ScanlineDriver {
        ScanlineDriver {
            line: AtomicU32::new(TOTAL_LINES - 1),
            frame_start: AtomicBool::new(false),
        }
    }

    /// The line most recently started, `0..TOTAL_LINES`.
    #[inline(always)]
    pub fn current_line(&self) -> u32 {
        self.line.load(Ordering::Relaxed)
    }

    /// Level flag: true while the raster is in line 0.
    #[inline(always)]
    pub fn frame_started(&self) -> bool {
        self.frame_start.load(Ordering::Relaxed)
    }

    /// The per-line interrupt body. Must complete well inside one line
    /// period; it does no allocation, no logging, and a bounded handful
    /// of register writes.
    ///
    /// Not reentrant: invocations must never overlap, or the line
    /// counter and descriptor swap race. The hardware backend
    /// guarantees this by running the line interrupt at the highest
    /// NVIC priority, so nothing can preempt the body with another
    /// line interrupt.
    pub fn on_line_interrupt<H: VideoHal>(
        &self,
        hal: &mut H,
        pipeline: &mut OutputPipeline,
        mode: &VideoMode,
        buffer_base: usize,
        shift: PixelShift,
    ) {
        hal.clear_line_flags();

        let line = (self.current_line() + 1) % TOTAL_LINES;
        self.line.store(line, Ordering::Relaxed);

        // V-pulse spans exactly line 0.
        if line == 0 {
            hal.set_vsync(true);
            self.frame_start.store(true, Ordering::Relaxed);
        } else {
            hal.set_vsync(false);
            self.frame_start.store(false, Ordering::Relaxed);
        }

        if let Some(row) = visible_row(line, mode.line_double, mode.height) {
            let program = pipeline.reprogram(hal, buffer_base, row, shift);
            pipeline.enable(hal);
            hal.flush_range(program.primary_source, program.flush_len);
        }
        // Blanking lines: channels keep whatever state the last visible
        // line left them in; nothing to do until the window returns.
    }
}

impl Default for ScanlineDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::OutputPipeline;
    use crate::mode::Mode;
    use crate::sim::SimHal;

    fn drive_lines(mode: Mode, ticks: u32) -> (ScanlineDriver, SimHal) {
        let vm = VideoMode::resolve(mode).unwrap();
        let mut pipeline = OutputPipeline::configure(&vm);
        let driver = ScanlineDriver::new();
        let mut hal = SimHal::new();
        for _ in 0..ticks {
            driver.on_line_interrupt(&mut hal, &mut pipeline, &vm, 0x2000_0000, vm.pixel_shift);
        }
        (driver, hal)
    }

    #[test]
    fn counter_wraps_after_total_lines() {
        let (driver, hal) = drive_lines(Mode::Vga640x480, TOTAL_LINES);
        assert_eq!(driver.current_line(), TOTAL_LINES - 1);
        assert_eq!(hal.vsync_asserts, 1);

        let (driver, hal) = drive_lines(Mode::Vga640x480, TOTAL_LINES + 1);
        assert_eq!(driver.current_line(), 0);
        assert!(driver.frame_started());
        assert_eq!(hal.vsync_asserts, 2);
    }

    #[test]
    fn one_frame_reprograms_every_visible_line() {
        let (_, hal) = drive_lines(Mode::Vga640x480, TOTAL_LINES);
        // Two source writes per visible line, 480 visible lines.
        assert_eq!(hal.source_writes.len(), 480 * 2);
        assert_eq!(hal.flushes.len(), 480);
    }

    #[test]
    fn line_double_halves_distinct_rows() {
        let vm = VideoMode::resolve(Mode::Vga320x240).unwrap();
        assert!(vm.line_double);
        // Two consecutive visible lines map to the same buffer row.
        let a = visible_row(TOP_BLANKING_LINES + 6, true, vm.height).unwrap();
        let b = visible_row(TOP_BLANKING_LINES + 7, true, vm.height).unwrap();
        assert_eq!(a, b);
        let c = visible_row(TOP_BLANKING_LINES + 8, true, vm.height).unwrap();
        assert_eq!(c, a + 1);

        let (_, hal) = drive_lines(Mode::Vga320x240, TOTAL_LINES);
        // 480 raster lines in the window, 240 distinct rows, each
        // reprogrammed twice.
        assert_eq!(hal.flushes.len(), 480);
    }

    #[test]
    fn blanking_lines_touch_nothing() {
        // First tick advances the counter to 0: vsync line, blanking.
        let (_, hal) = drive_lines(Mode::Vga640x480, TOP_BLANKING_LINES);
        assert!(hal.source_writes.is_empty());
        assert!(hal.arms.is_empty());
    }

    #[test]
    fn frame_start_is_a_level_over_line_zero() {
        let (driver, _) = drive_lines(Mode::Vga640x480, TOTAL_LINES + 1);
        assert!(driver.frame_started());
        let (driver, _) = drive_lines(Mode::Vga640x480, TOTAL_LINES + 2);
        assert!(!driver.frame_started());
    }

    #[test]
    fn timing_constants_match_line_rate() {
        let t = ScanlineTiming::vga60();
        // 4174 + 569 ticks of 6.7ns is one 31.78 µs line before margin.
        assert_eq!(t.line_ticks, 4193);
        assert_eq!(t.sync_low_ticks, 570);
    }
}

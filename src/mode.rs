//! # Mode Table & Timing Resolver
//!
//! Every supported resolution derives from one reference timing:
//! VGA 640×480@60Hz, 25.175 MHz pixel clock, 800 pixels per whole line
//! (640 visible + 48 back porch + 96 sync + 16 front porch), 525 lines
//! per frame of which 480 are visible.
//!
//! Narrower modes run the shift clock slower by a fixed ratio and shrink
//! the left/right borders by the same ratio, so the sync geometry on the
//! wire never changes. Halved-height modes transmit each buffer row
//! twice (`line_double`).
//!
//! | Mode     | clock ratio | borders | channels | pixel shift |
//! |----------|-------------|---------|----------|-------------|
//! | 320×240  | 2/1         | 24/8    | split    | 2 (byte)    |
//! | 320×480  | 2/1         | 24/8    | split    | 2 (byte)    |
//! | 640×240  | 1/1         | 48/16   | combined | 4           |
//! | 640×480  | 1/1         | 48/16   | combined | 4           |
//! | 512×240* | 13/10       | 36/12   | split    | 0           |
//! | 512×480* | 13/10       | 36/12   | split    | 0           |
//! | 352×240* | 7/4         | 27/9    | split    | 2 (byte)    |
//! | 352×480* | 7/4         | 27/9    | split    | 2 (byte)    |
//!
//! Modes marked `*` are experimental: they work on the displays they
//! were tuned against but their borders come from non-integral clock
//! ratios and may need a [`tweak`](crate::VideoController::tweak) on
//! other monitors.

use crate::clock::FLEXIO_CLOCK_KHZ;
use crate::VgaError;

/// Reference pixel clock, kHz (640-wide timing).
pub const PIX_FREQ_KHZ: u32 = 25_175;
/// Back-porch pixel budget at the reference clock.
pub const BACK_PORCH_PIX: u32 = 48;
/// Front-porch pixel budget at the reference clock.
pub const FRONT_PORCH_PIX: u32 = 16;
/// Scanlines per frame, visible + blanking.
pub const TOTAL_LINES: u32 = 525;
/// Blanking scanlines above the visible window.
pub const TOP_BLANKING_LINES: u32 = 40;

/// Requested resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Vga320x240,
    Vga320x480,
    Vga640x240,
    Vga640x480,
    Vga512x240,
    Vga512x480,
    Vga352x240,
    Vga352x480,
}

impl Mode {
    /// Modes whose border math comes from non-integral clock ratios.
    /// Kept for experimentation; not guaranteed stable on every display.
    pub fn is_experimental(self) -> bool {
        matches!(
            self,
            Mode::Vga512x240 | Mode::Vga512x480 | Mode::Vga352x240 | Mode::Vga352x480
        )
    }
}

/// Sub-word source offset applied to the secondary DMA channel.
///
/// The two DMA channels are started back to back by software, not by a
/// common hardware trigger, so the secondary channel samples a fixed few
/// pixel clocks late. Advancing its source pointer by `bytes` cancels
/// the resulting color smear. When `bytes` is not word-aligned the
/// channel has to fall back to byte-granularity reads — slower, but the
/// alignment is exact, and alignment wins.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PixelShift {
    pub bytes: u8,
}

impl PixelShift {
    pub const fn new(bytes: u8) -> Self {
        Self { bytes }
    }

    /// True when the shift cannot be expressed in whole 32-bit reads.
    #[inline(always)]
    pub fn unaligned(self) -> bool {
        self.bytes % 4 != 0
    }
}

/// A fully resolved mode: everything the clock, DMA, and scanline layers
/// need, computed once at `begin` and immutable afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VideoMode {
    pub mode: Mode,
    /// Visible pixels per line.
    pub width: u32,
    /// Visible lines per frame (after line doubling).
    pub height: u32,
    pub left_border: u32,
    pub right_border: u32,
    /// Bytes per buffer row: left border + width + right border.
    pub stride: u32,
    /// Transmit each buffer row twice (halves vertical resolution).
    pub line_double: bool,
    pub pixel_shift: PixelShift,
    /// Chain the two shift registers into one wide output word.
    pub combine_channels: bool,
    /// Shifter clock divisor relative to the FlexIO clock.
    pub clock_div: u32,
}

/// Per-mode constants: width, height, clock ratio (num/den slower than
/// the reference), divisor fudge, line doubling, shift, channel combine.
struct ModeEntry {
    mode: Mode,
    width: u32,
    height: u32,
    ratio_num: u32,
    ratio_den: u32,
    div_fudge: u32,
    line_double: bool,
    shift: u8,
    combine: bool,
}

// The +2 divisor fudge on the experimental modes is empirical, carried
// over from the hardware bring-up sessions that produced these timings.
const MODE_TABLE: &[ModeEntry] = &[
    ModeEntry { mode: Mode::Vga320x240, width: 320, height: 240, ratio_num: 2, ratio_den: 1, div_fudge: 0, line_double: true, shift: 2, combine: false },
    ModeEntry { mode: Mode::Vga320x480, width: 320, height: 480, ratio_num: 2, ratio_den: 1, div_fudge: 0, line_double: false, shift: 2, combine: false },
    ModeEntry { mode: Mode::Vga640x240, width: 640, height: 240, ratio_num: 1, ratio_den: 1, div_fudge: 0, line_double: true, shift: 4, combine: true },
    ModeEntry { mode: Mode::Vga640x480, width: 640, height: 480, ratio_num: 1, ratio_den: 1, div_fudge: 0, line_double: false, shift: 4, combine: true },
    ModeEntry { mode: Mode::Vga512x240, width: 512, height: 240, ratio_num: 13, ratio_den: 10, div_fudge: 2, line_double: true, shift: 0, combine: false },
    ModeEntry { mode: Mode::Vga512x480, width: 512, height: 480, ratio_num: 13, ratio_den: 10, div_fudge: 2, line_double: false, shift: 0, combine: false },
    ModeEntry { mode: Mode::Vga352x240, width: 352, height: 240, ratio_num: 7, ratio_den: 4, div_fudge: 2, line_double: true, shift: 2, combine: false },
    ModeEntry { mode: Mode::Vga352x480, width: 352, height: 480, ratio_num: 7, ratio_den: 4, div_fudge: 2, line_double: false, shift: 2, combine: false },
];

impl VideoMode {
    /// Resolve a requested mode into concrete timing.
    ///
    /// Pure and deterministic: the same `Mode` always yields the same
    /// `VideoMode`. Fails only if the derived stride would violate the
    /// DMA transfer granularity for the mode's channel layout.
    pub fn resolve(mode: Mode) -> Result<VideoMode, VgaError> {
        let entry = MODE_TABLE
            .iter()
            .find(|e| e.mode == mode)
            .ok_or(VgaError::ModeUnsupported)?;

        // Borders shrink with the pixel clock so blanking keeps its
        // on-the-wire duration. Truncating division, like the timings
        // these constants were derived from.
        let left_border = BACK_PORCH_PIX * entry.ratio_den / entry.ratio_num;
        let right_border = FRONT_PORCH_PIX * entry.ratio_den / entry.ratio_num;
        let stride = left_border + entry.width + right_border;

        let clock_div = (FLEXIO_CLOCK_KHZ as u64 * entry.ratio_num as u64
            / (entry.ratio_den as u64 * PIX_FREQ_KHZ as u64)) as u32
            + entry.div_fudge;

        let resolved = VideoMode {
            mode,
            width: entry.width,
            height: entry.height,
            left_border,
            right_border,
            stride,
            line_double: entry.line_double,
            pixel_shift: PixelShift::new(entry.shift),
            combine_channels: entry.combine,
            clock_div,
        };

        // A line must divide evenly into DMA requests or the last
        // request would read past it.
        if resolved.stride % resolved.transfer_granularity() != 0 {
            return Err(VgaError::ModeUnsupported);
        }
        debug_assert!(resolved.stride >= resolved.width);

        log::debug!(
            "mode {:?}: {}x{} stride {} borders {}/{} div {} combine {} shift {}",
            mode,
            resolved.width,
            resolved.height,
            resolved.stride,
            resolved.left_border,
            resolved.right_border,
            resolved.clock_div,
            resolved.combine_channels,
            resolved.pixel_shift.bytes,
        );
        Ok(resolved)
    }

    /// Bytes per DMA request for this mode's channel layout.
    pub fn transfer_granularity(&self) -> u32 {
        if self.combine_channels {
            8
        } else {
            4
        }
    }

    /// All catalogued modes, for enumeration in tests and tooling.
    pub fn all_modes() -> impl Iterator<Item = Mode> {
        MODE_TABLE.iter().map(|e| e.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mode_satisfies_stride_invariants() {
        for mode in VideoMode::all_modes() {
            let vm = VideoMode::resolve(mode).unwrap();
            assert!(vm.stride >= vm.width, "{mode:?}: stride < width");
            assert_eq!(
                vm.stride % vm.transfer_granularity(),
                0,
                "{mode:?}: stride {} not a multiple of {}",
                vm.stride,
                vm.transfer_granularity()
            );
            assert_eq!(vm.stride, vm.left_border + vm.width + vm.right_border);
        }
    }

    #[test]
    fn reference_mode_timing() {
        let vm = VideoMode::resolve(Mode::Vga640x480).unwrap();
        assert_eq!(vm.stride, BACK_PORCH_PIX + 640 + FRONT_PORCH_PIX);
        assert_eq!((vm.left_border, vm.right_border), (48, 16));
        assert!(!vm.line_double);
        assert!(vm.combine_channels);
        assert_eq!(vm.clock_div, 10);
    }

    #[test]
    fn halved_modes_line_double() {
        let vm = VideoMode::resolve(Mode::Vga320x240).unwrap();
        assert!(vm.line_double);
        assert_eq!((vm.left_border, vm.right_border), (24, 8));
        assert_eq!(vm.clock_div, 20);
        assert!(vm.pixel_shift.unaligned());
    }

    #[test]
    fn experimental_mode_borders_truncate() {
        let vm = VideoMode::resolve(Mode::Vga512x480).unwrap();
        assert_eq!((vm.left_border, vm.right_border), (36, 12));
        assert_eq!(vm.clock_div, 15);
        assert!(vm.mode.is_experimental());

        let vm = VideoMode::resolve(Mode::Vga352x480).unwrap();
        assert_eq!((vm.left_border, vm.right_border), (27, 9));
        assert_eq!(vm.clock_div, 19);
    }

    #[test]
    fn combined_mode_shift_is_aligned() {
        let vm = VideoMode::resolve(Mode::Vga640x480).unwrap();
        assert!(!vm.pixel_shift.unaligned());
        assert_eq!(vm.pixel_shift.bytes, 4);
    }
}

//! # DMA Output Pipeline
//!
//! Two eDMA channels stream each scanline from the frame buffer into
//! the two FlexIO shifter groups. A channel's descriptor is installed
//! once per mode; its source-rewind field walks the source pointer back
//! to line start after every line, so the per-line interrupt only has
//! to refresh the source address and re-arm.
//!
//! Split layout: each channel independently feeds 4 color bits per
//! pixel group from its own 32-bit reads. Combined layout: the shifters
//! are chained into one wide word and both channels move 8 bytes per
//! request — the highest-bandwidth modes need the doubled output width.
//!
//! The channels are software-started a few cycles apart, so the
//! secondary channel's source is advanced by the mode's pixel shift.
//! When that shift is not word-aligned the secondary descriptor drops
//! to byte-granularity source reads. That trade is deliberate: a
//! byte-exact slow transfer beats a fast one that smears color.

use crate::hal::VideoHal;
use crate::mode::{PixelShift, VideoMode};

/// The two output channels, named for their role, not their FlexIO
/// instance: `Primary` feeds the low color bits, `Secondary` the high.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputChannel {
    Primary,
    Secondary,
}

/// Destination shifter data port for a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShifterPort {
    /// Primary shifter buffer (natural bit order).
    Primary,
    /// Secondary shifter buffer (nibble-byte-swapped view).
    Secondary,
}

/// Per-access transfer width, encoded as the eDMA ATTR size field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferSize {
    Byte,
    Word,
    DoubleWord,
}

impl TransferSize {
    /// ATTR SSIZE/DSIZE encoding.
    pub fn attr_bits(self) -> u16 {
        match self {
            TransferSize::Byte => 0,
            TransferSize::Word => 2,
            TransferSize::DoubleWord => 3,
        }
    }
}

/// Everything a channel needs except the per-line source address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    /// Bytes moved per shifter request.
    pub nbytes: u16,
    /// Source pointer step per read.
    pub source_step: i16,
    /// Added to the source pointer when the line completes; negative
    /// one stride, so the descriptor re-arms at line start.
    pub source_rewind: i32,
    /// Requests per line (major iteration count).
    pub iterations: u16,
    pub dest: ShifterPort,
    pub src_size: TransferSize,
    pub dst_size: TransferSize,
    /// Channel disarms itself when the line completes; the interrupt
    /// re-arms it for the next visible line.
    pub disable_on_done: bool,
}

/// Source addresses for one line, produced by `reprogram`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineProgram {
    pub primary_source: usize,
    pub secondary_source: usize,
    /// Bytes to write back from cache before the transfer.
    pub flush_len: usize,
}

/// Both channels' descriptors plus the channel-combination mode.
#[derive(Debug, Clone)]
pub struct OutputPipeline {
    primary: TransferDescriptor,
    secondary: TransferDescriptor,
    combined: bool,
    stride: u32,
    secondary_unaligned: bool,
}

impl OutputPipeline {
    /// Build both descriptors for a resolved mode.
    pub fn configure(mode: &VideoMode) -> OutputPipeline {
        let stride = mode.stride;
        let unaligned = !mode.combine_channels && mode.pixel_shift.unaligned();
        let pipeline = if mode.combine_channels {
            // Chained shifters: 8 bytes per request, 32-bit reads
            // widened to 64-bit writes across both shifter buffers.
            OutputPipeline {
                primary: Self::wide_descriptor(stride, ShifterPort::Primary),
                secondary: Self::wide_descriptor(stride, ShifterPort::Secondary),
                combined: true,
                stride,
                secondary_unaligned: false,
            }
        } else {
            OutputPipeline {
                primary: Self::word_descriptor(stride, ShifterPort::Primary),
                secondary: Self::split_secondary(stride, unaligned),
                combined: false,
                stride,
                secondary_unaligned: unaligned,
            }
        };
        log::debug!(
            "pipeline: {} layout, {} requests of {} bytes per line",
            if pipeline.combined { "combined" } else { "split" },
            pipeline.primary.iterations,
            pipeline.primary.nbytes,
        );
        pipeline
    }

    fn word_descriptor(stride: u32, dest: ShifterPort) -> TransferDescriptor {
        TransferDescriptor {
            nbytes: 4,
            source_step: 4,
            source_rewind: -(stride as i32),
            iterations: (stride / 4) as u16,
            dest,
            src_size: TransferSize::Word,
            dst_size: TransferSize::Word,
            disable_on_done: true,
        }
    }

    fn wide_descriptor(stride: u32, dest: ShifterPort) -> TransferDescriptor {
        TransferDescriptor {
            nbytes: 8,
            source_step: 4,
            source_rewind: -(stride as i32),
            iterations: (stride / 8) as u16,
            dest,
            src_size: TransferSize::Word,
            dst_size: TransferSize::DoubleWord,
            disable_on_done: true,
        }
    }

    fn split_secondary(stride: u32, unaligned: bool) -> TransferDescriptor {
        let mut desc = Self::word_descriptor(stride, ShifterPort::Secondary);
        if unaligned {
            // Byte-granular source reads reach sub-word offsets the
            // word descriptor cannot.
            desc.source_step = 1;
            desc.src_size = TransferSize::Byte;
        }
        desc
    }

    /// Install both descriptors into the hardware.
    pub fn install<H: VideoHal>(&self, hal: &mut H) {
        hal.install_descriptor(OutputChannel::Primary, &self.primary);
        hal.install_descriptor(OutputChannel::Secondary, &self.secondary);
    }

    /// Re-arm both channels for the next line.
    pub fn enable<H: VideoHal>(&self, hal: &mut H) {
        hal.arm(OutputChannel::Primary);
        hal.arm(OutputChannel::Secondary);
    }

    /// Stop both channels responding to requests.
    pub fn disable<H: VideoHal>(&self, hal: &mut H) {
        hal.disarm(OutputChannel::Primary);
        hal.disarm(OutputChannel::Secondary);
    }

    /// Point both channels at visible row `y`.
    ///
    /// The secondary source leads the primary by exactly the current
    /// pixel shift. A tweak can move the shift across the word-alignment
    /// boundary at runtime; when that happens the secondary descriptor
    /// is swapped for the matching granularity before the addresses go
    /// in.
    pub fn reprogram<H: VideoHal>(
        &mut self,
        hal: &mut H,
        base: usize,
        y: u32,
        shift: PixelShift,
    ) -> LineProgram {
        if !self.combined && shift.unaligned() != self.secondary_unaligned {
            self.secondary = Self::split_secondary(self.stride, shift.unaligned());
            self.secondary_unaligned = shift.unaligned();
            hal.install_descriptor(OutputChannel::Secondary, &self.secondary);
        }
        let line = base + (self.stride as usize) * y as usize;
        let program = LineProgram {
            primary_source: line,
            secondary_source: line + shift.bytes as usize,
            flush_len: self.stride as usize,
        };
        hal.set_source(OutputChannel::Primary, program.primary_source);
        hal.set_source(OutputChannel::Secondary, program.secondary_source);
        program
    }

    pub fn primary(&self) -> &TransferDescriptor {
        &self.primary
    }

    pub fn secondary(&self) -> &TransferDescriptor {
        &self.secondary
    }

    pub fn is_combined(&self) -> bool {
        self.combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Mode, VideoMode};
    use crate::sim::SimHal;

    #[test]
    fn combined_mode_moves_eight_bytes_per_request() {
        let vm = VideoMode::resolve(Mode::Vga640x480).unwrap();
        let p = OutputPipeline::configure(&vm);
        assert!(p.is_combined());
        assert_eq!(p.primary().nbytes, 8);
        assert_eq!(p.primary().iterations as u32, vm.stride / 8);
        assert_eq!(p.primary().dst_size, TransferSize::DoubleWord);
        assert_eq!(p.primary().source_rewind, -(vm.stride as i32));
    }

    #[test]
    fn unaligned_shift_downgrades_secondary_to_bytes() {
        let vm = VideoMode::resolve(Mode::Vga320x480).unwrap();
        let p = OutputPipeline::configure(&vm);
        assert_eq!(p.secondary().source_step, 1);
        assert_eq!(p.secondary().src_size, TransferSize::Byte);
        // Primary is unaffected.
        assert_eq!(p.primary().source_step, 4);
        assert_eq!(p.primary().src_size, TransferSize::Word);
    }

    #[test]
    fn sources_differ_by_exactly_the_shift() {
        let vm = VideoMode::resolve(Mode::Vga320x480).unwrap();
        let mut p = OutputPipeline::configure(&vm);
        let mut hal = SimHal::new();
        for y in [0u32, 1, 7, 479] {
            let lp = p.reprogram(&mut hal, 0x2000_0000, y, vm.pixel_shift);
            assert_eq!(
                lp.secondary_source - lp.primary_source,
                vm.pixel_shift.bytes as usize
            );
            assert_eq!(
                lp.primary_source,
                0x2000_0000 + vm.stride as usize * y as usize
            );
        }
    }

    #[test]
    fn shift_crossing_alignment_reinstalls_secondary() {
        let vm = VideoMode::resolve(Mode::Vga512x480).unwrap();
        let mut p = OutputPipeline::configure(&vm);
        let mut hal = SimHal::new();
        // Shift 0 is aligned: word-granular secondary.
        p.reprogram(&mut hal, 0x1000, 0, vm.pixel_shift);
        assert_eq!(p.secondary().source_step, 4);
        let installs_before = hal.descriptor_installs.len();

        // A +1 tweak makes it unaligned: descriptor must be swapped.
        p.reprogram(&mut hal, 0x1000, 1, crate::mode::PixelShift::new(1));
        assert_eq!(p.secondary().source_step, 1);
        assert_eq!(hal.descriptor_installs.len(), installs_before + 1);

        // And stays swapped without reinstalling every line.
        p.reprogram(&mut hal, 0x1000, 2, crate::mode::PixelShift::new(1));
        assert_eq!(hal.descriptor_installs.len(), installs_before + 1);
    }
}

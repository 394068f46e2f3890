//! End-to-end scanout scenarios against the recording HAL: full
//! lifecycle, one frame of line interrupts, and live picture tweaks,
//! exactly the call sequence the hardware interrupt glue performs.

use vga_scanout::clock::FLEXIO_CLOCK_KHZ;
use vga_scanout::dma::OutputChannel;
use vga_scanout::mode::{TOP_BLANKING_LINES, TOTAL_LINES};
use vga_scanout::sim::SimHal;
use vga_scanout::{rgb, Mode, VideoController};

#[test]
fn full_frame_at_640x480() {
    let mut vga = VideoController::new(SimHal::new());
    vga.begin(Mode::Vga640x480).unwrap();

    let mode = *vga.mode().unwrap();
    assert_eq!(mode.stride, 704);
    assert!(mode.combine_channels);
    assert!(!mode.line_double);

    vga.framebuffer_mut().unwrap().clear(rgb(0, 0, 255));

    for _ in 0..TOTAL_LINES {
        vga.on_line_interrupt();
    }

    let hal = vga.hal();
    assert_eq!(hal.vsync_asserts, 1);
    assert_eq!(hal.flushes.len(), 480);
    // Two channels re-pointed and re-armed per visible line.
    assert_eq!(hal.source_writes.len(), 480 * 2);
    assert_eq!(hal.arms.len(), 480 * 2);

    // Consecutive visible lines advance the primary source by exactly
    // one stride.
    let primaries: Vec<usize> = hal
        .source_writes
        .iter()
        .filter(|(ch, _)| *ch == OutputChannel::Primary)
        .map(|&(_, addr)| addr)
        .collect();
    for pair in primaries.windows(2) {
        assert_eq!(pair[1] - pair[0], 704);
    }
    // Every flush covers one full row.
    assert!(hal.flushes.iter().all(|&(_, len)| len == 704));
}

#[test]
fn line_doubled_mode_sends_each_row_twice() {
    let mut vga = VideoController::new(SimHal::new());
    vga.begin(Mode::Vga320x240).unwrap();
    assert!(vga.mode().unwrap().line_double);

    for _ in 0..TOTAL_LINES {
        vga.on_line_interrupt();
    }

    let hal = vga.hal();
    let primaries: Vec<usize> = hal
        .source_writes
        .iter()
        .filter(|(ch, _)| *ch == OutputChannel::Primary)
        .map(|&(_, addr)| addr)
        .collect();
    assert_eq!(primaries.len(), 480);
    for row in primaries.chunks(2) {
        assert_eq!(row[0], row[1]);
    }
}

#[test]
fn tweak_moves_the_secondary_channel_and_trims_the_clock() {
    let mut vga = VideoController::new(SimHal::new());
    vga.begin(Mode::Vga320x480).unwrap();
    let base_shift = vga.mode().unwrap().pixel_shift.bytes as usize;

    // Reach the visible window so source writes happen.
    for _ in 0..=TOP_BLANKING_LINES {
        vga.on_line_interrupt();
    }
    vga.tweak(1, -20, 0).unwrap();
    vga.on_line_interrupt();

    let hal = vga.hal();
    let n = hal.source_writes.len();
    let (_, primary) = hal.source_writes[n - 2];
    let (_, secondary) = hal.source_writes[n - 1];
    assert_eq!(secondary - primary, base_shift + 1);

    // The trim is relative to the program begin locked.
    assert_eq!(hal.pll_programs.len(), 2);
    let base = hal.pll_programs[0];
    assert_eq!(hal.pll_programs[1], base.adjusted(-20, 0));
    assert_eq!(base.output_khz(), FLEXIO_CLOCK_KHZ);
}

#[test]
fn restart_into_another_mode_reuses_the_controller() {
    let mut vga = VideoController::new(SimHal::new());
    vga.begin(Mode::Vga320x240).unwrap();
    vga.framebuffer_mut().unwrap().set_pixel(0, 0, 0x12);
    vga.begin(Mode::Vga640x480).unwrap();

    assert_eq!(vga.frame_size(), (640, 480));
    // The new buffer starts black.
    assert_eq!(vga.framebuffer().unwrap().pixel(0, 0), Some(0));

    vga.end();
    assert!(!vga.is_running());
    assert_eq!(vga.hal().output_shutdowns, 2);
}

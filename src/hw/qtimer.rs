//! Quad timer channel driving the horizontal sync line.
//!
//! One TMR3 channel free-runs in alternating-compare mode: COMP1 holds
//! the sync-low tick count, COMP2 the rest of the line, and the output
//! flag toggles at each compare. That makes the hsync waveform in
//! hardware with no software in the loop. The same compare raises the
//! per-line interrupt.

use volatile_register::RW;

use crate::scanline::ScanlineTiming;

pub const TMR3_BASE: usize = 0x401D_C000;
/// Channel used for hsync; 0x20 bytes per channel.
pub const HSYNC_CHANNEL: usize = 3;

bitflags::bitflags! {
    /// `TMR_CSCTRL` bits.
    #[derive(Copy, Clone)]
    pub struct CompareStatusCtrl: u16 {
        /// Compare 1 interrupt enable.
        const TCF1EN = 1 << 6;
        /// Compare 1 fired.
        const TCF1   = 1 << 4;
        /// Compare 2 fired.
        const TCF2   = 1 << 5;
        /// Compare 1 loads from CMPLD1.
        const CL1_COMP1 = 0b01;
        /// Compare 2 loads from CMPLD2.
        const CL2_COMP2 = 0b10 << 2;
    }
}

/// CTRL: count rising edges of the IP bus clock, count repeatedly,
/// alternate COMP1/COMP2, toggle OFLAG on compare.
const CTRL_RUN: u16 = (0b001 << 13) | (0b1000 << 9) | (0b11 << 6) | (1 << 5);

#[repr(C)]
pub struct TimerChannel {
    pub comp1: RW<u16>,
    pub comp2: RW<u16>,
    pub capt: RW<u16>,
    pub load: RW<u16>,
    pub hold: RW<u16>,
    pub cntr: RW<u16>,
    pub ctrl: RW<u16>,
    pub sctrl: RW<u16>,
    pub cmpld1: RW<u16>,
    pub cmpld2: RW<u16>,
    pub csctrl: RW<u16>,
    pub filt: RW<u16>,
    pub dma: RW<u16>,
    _reserved: [u16; 3],
}

impl TimerChannel {
    pub unsafe fn hsync() -> &'static mut TimerChannel {
        unsafe { &mut *((TMR3_BASE + HSYNC_CHANNEL * 0x20) as *mut TimerChannel) }
    }

    /// Load the line timing and arm the compare interrupt. The counter
    /// does not run until [`start`].
    ///
    /// [`start`]: TimerChannel::start
    pub fn configure(&mut self, timing: &ScanlineTiming) {
        unsafe {
            self.ctrl.write(0);
            self.load.write(0);
            self.cntr.write(0);
            self.comp1.write(timing.sync_low_ticks);
            self.comp2.write(timing.line_ticks - timing.sync_low_ticks);
            self.cmpld1.write(timing.sync_low_ticks);
            self.cmpld2.write(timing.line_ticks - timing.sync_low_ticks);
            self.csctrl.write(
                (CompareStatusCtrl::TCF1EN
                    | CompareStatusCtrl::CL1_COMP1
                    | CompareStatusCtrl::CL2_COMP2)
                    .bits(),
            );
        }
    }

    #[inline(always)]
    pub fn start(&mut self) {
        unsafe { self.ctrl.write(CTRL_RUN) };
    }

    #[inline(always)]
    pub fn stop(&mut self) {
        unsafe { self.ctrl.write(0) };
    }

    /// Acknowledge both compare flags, leaving the enables intact.
    #[inline(always)]
    pub fn clear_compare_flags(&mut self) {
        unsafe {
            self.csctrl.modify(|v| {
                v & !(CompareStatusCtrl::TCF1 | CompareStatusCtrl::TCF2).bits()
            });
        }
    }
}

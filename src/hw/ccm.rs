//! Clock Controller Module and its analog companion block.
//!
//! Only the pieces the scanout path touches are mapped: the video PLL
//! (PLL5), the FlexIO2 clock mux/divider fields, and the clock gates
//! for FlexIO2, the quad timer, eDMA, and SAI1.

use bit_field::BitField;
use volatile_register::RW;

use crate::clock::ClockProgram;

bitflags::bitflags! {
    /// `CCM_ANALOG_PLL_VIDEO` control bits.
    #[derive(Copy, Clone)]
    pub struct PllVideoCtrl: u32 {
        const POWERDOWN = 1 << 12;
        const ENABLE    = 1 << 13;
        /// Output follows the 24 MHz reference while set; cleared only
        /// after lock so the glitch stays off the pixel clock.
        const BYPASS    = 1 << 16;
        const LOCK      = 1 << 31;
    }
}

/// `DIV_SELECT`, bits 6:0.
const DIV_SELECT_BITS: core::ops::Range<usize> = 0..7;
/// `POST_DIV_SELECT`, bits 20:19. Encodes 2 -> /1, 1 -> /2, 0 -> /4.
const POST_DIV_BITS: core::ops::Range<usize> = 19..21;

/// Analog block: each control register has hardware set/clear/toggle
/// aliases at +4/+8/+12.
#[repr(C)]
pub struct CcmAnalog {
    _reserved0: [u32; 40],
    pub pll_video: RW<u32>,     // 0xA0
    pub pll_video_set: RW<u32>, // 0xA4
    pub pll_video_clr: RW<u32>, // 0xA8
    pub pll_video_tog: RW<u32>, // 0xAC
    pub pll_video_num: RW<u32>, // 0xB0
    _reserved1: [u32; 3],
    pub pll_video_denom: RW<u32>, // 0xC0
    _reserved2: [u32; 3],
}

impl CcmAnalog {
    pub unsafe fn new() -> &'static mut CcmAnalog {
        unsafe { &mut *(0x400D_8000 as *mut CcmAnalog) }
    }

    /// Write a synthesized program with the PLL bypassed. The caller
    /// waits for lock, then calls [`take_video_pll_live`].
    ///
    /// [`take_video_pll_live`]: CcmAnalog::take_video_pll_live
    pub fn program_video_pll(&mut self, program: &ClockProgram) {
        let post_div_field: u32 = match program.post_div {
            1 => 2,
            2 => 1,
            _ => 0,
        };
        let mut ctrl = (PllVideoCtrl::BYPASS | PllVideoCtrl::ENABLE).bits();
        ctrl.set_bits(DIV_SELECT_BITS, program.div_select);
        ctrl.set_bits(POST_DIV_BITS, post_div_field);
        unsafe {
            self.pll_video_num.write(program.num);
            self.pll_video_denom.write(program.denom);
            self.pll_video.write(ctrl);
        }
    }

    #[inline(always)]
    pub fn video_pll_locked(&self) -> bool {
        self.pll_video.read() & PllVideoCtrl::LOCK.bits() != 0
    }

    /// Drop bypass so the locked PLL output reaches the clock tree.
    pub fn take_video_pll_live(&mut self) {
        unsafe { self.pll_video_clr.write(PllVideoCtrl::BYPASS.bits()) };
    }

    /// Rewrite only the fractional part. The PLL tracks small `NUM`
    /// and `DENOM` changes without dropping lock, so output continues
    /// while the frequency glides.
    pub fn trim_video_pll(&mut self, program: &ClockProgram) {
        unsafe {
            self.pll_video_num.write(program.num);
            self.pll_video_denom.write(program.denom);
        }
    }

    pub fn power_down_video_pll(&mut self) {
        unsafe { self.pll_video_set.write(PllVideoCtrl::POWERDOWN.bits()) };
    }
}

/// `FLEXIO2_CLK_SEL`, `CSCMR2` bits 20:19. Value 3 selects the video
/// PLL.
const FLEXIO2_CLK_SEL_BITS: core::ops::Range<usize> = 19..21;
/// `FLEXIO2_CLK_PRED`, `CS1CDR` bits 11:9.
const FLEXIO2_CLK_PRED_BITS: core::ops::Range<usize> = 9..12;
/// `FLEXIO2_CLK_PODF`, `CS1CDR` bits 27:25.
const FLEXIO2_CLK_PODF_BITS: core::ops::Range<usize> = 25..28;

/// Two-bit clock gate value: clocked in all power modes.
pub const CCGR_ON: u32 = 0b11;

pub const CCGR3_FLEXIO2_SHIFT: usize = 2;
pub const CCGR5_DMA_SHIFT: usize = 6;
pub const CCGR5_SAI1_SHIFT: usize = 18;
pub const CCGR6_QTIMER3_SHIFT: usize = 26;

#[repr(C)]
pub struct Ccm {
    pub ccr: RW<u32>, // 0x00
    _reserved0: [u32; 6],
    pub cscmr1: RW<u32>, // 0x1C
    pub cscmr2: RW<u32>, // 0x20
    pub cscdr1: RW<u32>, // 0x24
    pub cs1cdr: RW<u32>, // 0x28
    _reserved1: [u32; 15],
    pub ccgr0: RW<u32>, // 0x68
    pub ccgr1: RW<u32>,
    pub ccgr2: RW<u32>,
    pub ccgr3: RW<u32>,
    pub ccgr4: RW<u32>,
    pub ccgr5: RW<u32>,
    pub ccgr6: RW<u32>,
    pub ccgr7: RW<u32>,
}

impl Ccm {
    pub unsafe fn new() -> &'static mut Ccm {
        unsafe { &mut *(0x400F_C000 as *mut Ccm) }
    }

    /// Route the video PLL to FlexIO2 undivided. The per-mode divider
    /// lives in the FlexIO shift timer, not here.
    pub fn route_video_pll_to_flexio2(&mut self) {
        unsafe {
            self.cscmr2.modify(|mut v| {
                v.set_bits(FLEXIO2_CLK_SEL_BITS, 3);
                v
            });
            self.cs1cdr.modify(|mut v| {
                v.set_bits(FLEXIO2_CLK_PRED_BITS, 0);
                v.set_bits(FLEXIO2_CLK_PODF_BITS, 0);
                v
            });
        }
    }

    pub fn gate_scanout_clocks(&mut self, on: bool) {
        let v = if on { CCGR_ON } else { 0 };
        unsafe {
            self.ccgr3
                .modify(|r| r & !(0b11 << CCGR3_FLEXIO2_SHIFT) | (v << CCGR3_FLEXIO2_SHIFT));
            self.ccgr5
                .modify(|r| r & !(0b11 << CCGR5_DMA_SHIFT) | (v << CCGR5_DMA_SHIFT));
            self.ccgr6
                .modify(|r| r & !(0b11 << CCGR6_QTIMER3_SHIFT) | (v << CCGR6_QTIMER3_SHIFT));
        }
    }

    pub fn gate_audio_clock(&mut self, on: bool) {
        let v = if on { CCGR_ON } else { 0 };
        unsafe {
            self.ccgr5
                .modify(|r| r & !(0b11 << CCGR5_SAI1_SHIFT) | (v << CCGR5_SAI1_SHIFT));
        }
    }
}

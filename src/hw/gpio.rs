//! The one GPIO the subsystem drives directly: vertical sync.
//!
//! Hsync comes out of the timer's output flag with no software in the
//! loop; vsync changes once per frame, so a set/clear from the line
//! interrupt is cheap enough.

use volatile_register::{RW, WO};

pub const GPIO2_BASE: usize = 0x401B_C000;

#[repr(C)]
pub struct Gpio {
    pub dr: RW<u32>,   // 0x00
    pub gdir: RW<u32>, // 0x04
    pub psr: RW<u32>,
    pub icr1: RW<u32>,
    pub icr2: RW<u32>,
    pub imr: RW<u32>,
    pub isr: RW<u32>,
    pub edge_sel: RW<u32>,
    _reserved: [u32; 25],
    pub dr_set: WO<u32>,    // 0x84
    pub dr_clear: WO<u32>,  // 0x88
    pub dr_toggle: WO<u32>, // 0x8C
}

impl Gpio {
    pub unsafe fn gpio2() -> &'static mut Gpio {
        unsafe { &mut *(GPIO2_BASE as *mut Gpio) }
    }

    /// Make `mask` pins outputs, initially low.
    pub fn make_output(&mut self, mask: u32) {
        unsafe {
            self.dr_clear.write(mask);
            self.gdir.modify(|v| v | mask);
        }
    }

    #[inline(always)]
    pub fn set(&mut self, mask: u32, high: bool) {
        unsafe {
            if high {
                self.dr_set.write(mask);
            } else {
                self.dr_clear.write(mask);
            }
        }
    }
}

//! Interrupt controller plumbing for the three interrupt levels the
//! subsystem uses.
//!
//! Priority layering is load-bearing: the line interrupt preempts
//! everything (a late hsync reprogram tears the picture), the audio
//! drain sits in the middle (a late sample clicks), and the refill runs
//! lowest so an expensive sample generator can be preempted by both.

use volatile_register::{RW, WO};

pub const IRQ_SAI1: usize = 56;
/// Unwired interrupt slot, software-pended for the audio refill.
pub const IRQ_SOFTWARE: usize = 70;
pub const IRQ_QTIMER3: usize = 135;

/// Cortex-M7 priority bytes, lower is more urgent. Only the top four
/// bits are implemented.
pub const PRIO_SCANLINE: u8 = 0x00;
pub const PRIO_AUDIO_DRAIN: u8 = 0x7F;
pub const PRIO_AUDIO_REFILL: u8 = 0xD0;

#[repr(C)]
pub struct Nvic {
    pub iser: [RW<u32>; 8], // 0xE000E100
    _reserved0: [u32; 24],
    pub icer: [RW<u32>; 8], // 0xE000E180
    _reserved1: [u32; 24],
    pub ispr: [WO<u32>; 8], // 0xE000E200
    _reserved2: [u32; 24],
    pub icpr: [WO<u32>; 8], // 0xE000E280
    _reserved3: [u32; 88],
    pub ipr: [RW<u8>; 240], // 0xE000E400
}

impl Nvic {
    pub unsafe fn new() -> &'static mut Nvic {
        unsafe { &mut *(0xE000_E100 as *mut Nvic) }
    }

    pub fn enable(&mut self, irq: usize, priority: u8) {
        unsafe {
            self.ipr[irq].write(priority);
            self.iser[irq / 32].write(1 << (irq % 32));
        }
    }

    pub fn disable(&mut self, irq: usize) {
        unsafe { self.icer[irq / 32].write(1 << (irq % 32)) };
    }

    /// Software-pend an interrupt; it runs when priority allows.
    #[inline(always)]
    pub fn pend(&mut self, irq: usize) {
        unsafe { self.ispr[irq / 32].write(1 << (irq % 32)) };
    }
}

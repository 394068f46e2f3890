//! FlexIO2 shifter block.
//!
//! Shifters 0 and 1 serialize the pixel stream; timer 0 divides the
//! FlexIO clock down to the mode's pixel rate and clocks both shifters.
//! The DMA engine refills the shift buffers through `SHIFTBUF` (natural
//! byte order) and `SHIFTBUFNBS` (nibble-byte-swapped), whichever view
//! matches the pin wiring of each color half.

use volatile_register::{RO, RW};

use crate::mode::VideoMode;

pub const FLEXIO2_BASE: usize = 0x401B_0000;

const SHIFTER_COUNT: usize = 8;
const TIMER_COUNT: usize = 8;

bitflags::bitflags! {
    /// `FLEXIO_CTRL` bits.
    #[derive(Copy, Clone)]
    pub struct FlexIoCtrl: u32 {
        const FLEXEN = 1 << 0;
        const SWRST  = 1 << 1;
        /// Register access at core speed instead of the FlexIO clock.
        const FASTACC = 1 << 2;
    }
}

#[repr(C)]
pub struct FlexIo {
    pub verid: RO<u32>, // 0x000
    pub param: RO<u32>, // 0x004
    pub ctrl: RW<u32>,  // 0x008
    pub pin: RO<u32>,   // 0x00C
    pub shiftstat: RW<u32>,
    pub shifterr: RW<u32>,
    pub timstat: RW<u32>,
    _reserved0: u32,
    pub shiftsien: RW<u32>, // 0x020
    pub shifteien: RW<u32>,
    pub timien: RW<u32>,
    _reserved1: u32,
    /// DMA request enable, one bit per shifter.
    pub shiftsden: RW<u32>, // 0x030
    _reserved2: [u32; 19],
    pub shiftctl: [RW<u32>; SHIFTER_COUNT], // 0x080
    _reserved3: [u32; 24],
    pub shiftcfg: [RW<u32>; SHIFTER_COUNT], // 0x100
    _reserved4: [u32; 56],
    pub shiftbuf: [RW<u32>; SHIFTER_COUNT], // 0x200
    _reserved5: [u32; 24],
    pub shiftbufbbs: [RW<u32>; SHIFTER_COUNT], // 0x280
    _reserved6: [u32; 24],
    pub shiftbufbys: [RW<u32>; SHIFTER_COUNT], // 0x300
    _reserved7: [u32; 24],
    pub shiftbufbis: [RW<u32>; SHIFTER_COUNT], // 0x380
    _reserved8: [u32; 24],
    pub timctl: [RW<u32>; TIMER_COUNT], // 0x400
    _reserved9: [u32; 24],
    pub timcfg: [RW<u32>; TIMER_COUNT], // 0x480
    _reserved10: [u32; 24],
    pub timcmp: [RW<u32>; TIMER_COUNT], // 0x500
    _reserved11: [u32; 88],
    pub shiftbufnbs: [RW<u32>; SHIFTER_COUNT], // 0x680
}

/// SHIFTCTL: transmit mode, output on the shifter's pin group, clocked
/// by timer 0 on its positive edge.
const SHIFTCTL_TRANSMIT: u32 = 0b010;
const SHIFTCTL_PIN_OUTPUT: u32 = 0b11 << 16;

/// TIMCTL: dual 8-bit counter baud mode, always enabled.
const TIMCTL_BAUD_MODE: u32 = 0b001;
const TIMCFG_ENABLED_ALWAYS: u32 = 0;

impl FlexIo {
    pub unsafe fn new() -> &'static mut FlexIo {
        unsafe { &mut *(FLEXIO2_BASE as *mut FlexIo) }
    }

    /// DMA destination for the primary channel: shifter 0's natural
    /// buffer.
    pub fn primary_port_addr(&self) -> usize {
        &self.shiftbuf[0] as *const RW<u32> as usize
    }

    /// DMA destination for the secondary channel: shifter 1's
    /// nibble-byte-swapped view.
    pub fn secondary_port_addr(&self) -> usize {
        &self.shiftbufnbs[1] as *const RW<u32> as usize
    }

    /// Reset the block and set up shifters 0/1 plus the pixel-clock
    /// timer for a resolved mode.
    pub fn configure(&mut self, mode: &VideoMode) {
        unsafe {
            self.ctrl.write(FlexIoCtrl::SWRST.bits());
            self.ctrl.write(0);

            // 32 shifts per buffer reload in split mode; a chained
            // 64-bit reload in combined mode still shifts 32 per
            // buffer, the chain bit on shifter 1 links them.
            let chain = if mode.combine_channels { 1 << 8 } else { 0 };
            self.shiftcfg[0].write(0);
            self.shiftcfg[1].write(chain);
            self.shiftctl[0].write(SHIFTCTL_TRANSMIT | SHIFTCTL_PIN_OUTPUT);
            self.shiftctl[1].write(SHIFTCTL_TRANSMIT | SHIFTCTL_PIN_OUTPUT);

            // Dual 8-bit baud counter: low byte is the clock divider
            // (div/2 - 1), high byte the shifts per reload (n*2 - 1).
            let shifts: u32 = 32;
            self.timcfg[0].write(TIMCFG_ENABLED_ALWAYS);
            self.timcmp[0].write(((shifts * 2 - 1) << 8) | (mode.clock_div / 2 - 1));
            self.timctl[0].write(TIMCTL_BAUD_MODE);

            // Shifters 0 and 1 raise DMA requests when empty.
            self.shiftsden.write(0b11);
        }
    }

    pub fn enable(&mut self) {
        unsafe {
            self.ctrl
                .write((FlexIoCtrl::FLEXEN | FlexIoCtrl::FASTACC).bits())
        };
    }

    pub fn disable(&mut self) {
        unsafe { self.ctrl.write(0) };
    }
}

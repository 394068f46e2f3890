//! SAI1 transmit side, the audio collaborator's hardware end.
//!
//! Mono PCM out of transmit data register 0. The FIFO-request
//! interrupt is the sample drain; the pump refills one sample per
//! interrupt, so the FIFO watermark is set to one below full.

use volatile_register::{RO, RW, WO};

pub const SAI1_BASE: usize = 0x4038_4000;

bitflags::bitflags! {
    /// `SAI_TCSR` bits.
    #[derive(Copy, Clone)]
    pub struct TransmitCsr: u32 {
        /// FIFO request interrupt enable.
        const FRIE = 1 << 8;
        /// FIFO reset.
        const FR   = 1 << 25;
        /// Software reset.
        const SR   = 1 << 24;
        /// Transmitter enable.
        const TE   = 1 << 31;
    }
}

#[repr(C)]
pub struct Sai {
    pub verid: RO<u32>,
    pub param: RO<u32>,
    pub tcsr: RW<u32>, // 0x08
    pub tcr1: RW<u32>,
    pub tcr2: RW<u32>,
    pub tcr3: RW<u32>,
    pub tcr4: RW<u32>,
    pub tcr5: RW<u32>, // 0x1C
    pub tdr: [WO<u32>; 4], // 0x20
}

/// SAI1 runs from a 24.576 MHz audio root; the bit clock divider
/// brings 16-bit mono frames to the requested sample rate.
const AUDIO_ROOT_HZ: u32 = 24_576_000;

impl Sai {
    pub unsafe fn new() -> &'static mut Sai {
        unsafe { &mut *(SAI1_BASE as *mut Sai) }
    }

    pub fn configure(&mut self, sample_rate_hz: u32) {
        // DIV field is (root / (rate * bits * 2) / 2) - 1.
        let div = AUDIO_ROOT_HZ / (sample_rate_hz * 16 * 2) / 2;
        let div = div.saturating_sub(1).min(0xFF);
        unsafe {
            self.tcsr.write(TransmitCsr::SR.bits());
            self.tcsr.write(0);
            // Bit clock from the divider, active low, internally
            // generated.
            self.tcr2.write((1 << 24) | (1 << 25) | div);
            // One word per frame, 16-bit words, MSB first.
            self.tcr3.write(1); // channel 0 enable
            self.tcr4.write((0 << 16) | (15 << 8) | (1 << 4) | 1);
            self.tcr5.write((15 << 24) | (15 << 16) | (15 << 8));
            self.tcsr
                .write((TransmitCsr::TE | TransmitCsr::FRIE | TransmitCsr::FR).bits());
        }
    }

    #[inline(always)]
    pub fn push(&mut self, sample: i16) {
        unsafe { self.tdr[0].write(sample as u16 as u32) };
    }

    pub fn shutdown(&mut self) {
        unsafe { self.tcsr.write(0) };
    }
}

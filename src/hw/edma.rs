//! eDMA channels and the request mux.
//!
//! Each output channel owns one eDMA channel whose transfer control
//! descriptor is written once per mode. The per-line interrupt only
//! rewrites `SADDR` and re-enables the request, so the interrupt body
//! stays a handful of stores.

use volatile_register::{RW, WO};

use crate::dma::TransferDescriptor;

pub const DMA_BASE: usize = 0x400E_8000;
pub const DMAMUX_BASE: usize = 0x400E_C000;

/// eDMA channels assigned to the two output streams.
pub const PRIMARY_CHANNEL: usize = 0;
pub const SECONDARY_CHANNEL: usize = 1;

/// DMAMUX request source for FlexIO2 shifters 0/1.
pub const DMAMUX_SRC_FLEXIO2: u32 = 1;
const DMAMUX_ENBL: u32 = 1 << 31;

/// TCD CSR: channel clears its own request enable when the major loop
/// completes.
const CSR_DREQ: u16 = 1 << 3;

/// One transfer control descriptor, 32 bytes.
#[repr(C)]
pub struct Tcd {
    pub saddr: RW<u32>,
    pub soff: RW<i16>,
    pub attr: RW<u16>,
    pub nbytes: RW<u32>,
    pub slast: RW<i32>,
    pub daddr: RW<u32>,
    pub doff: RW<i16>,
    pub citer: RW<u16>,
    pub dlastsga: RW<i32>,
    pub csr: RW<u16>,
    pub biter: RW<u16>,
}

#[repr(C)]
pub struct Edma {
    pub cr: RW<u32>, // 0x00
    pub es: RW<u32>,
    _reserved0: u32,
    pub erq: RW<u32>, // 0x0C
    _reserved1: u32,
    pub eei: RW<u32>, // 0x14
    pub ceei: WO<u8>, // 0x18
    pub seei: WO<u8>,
    /// Clear one channel's request enable.
    pub cerq: WO<u8>, // 0x1A
    /// Set one channel's request enable.
    pub serq: WO<u8>, // 0x1B
    pub cdne: WO<u8>,
    pub ssrt: WO<u8>,
    pub cerr: WO<u8>,
    pub cint: WO<u8>, // 0x1F
    _reserved2: [u32; 1016],
    pub tcd: [Tcd; 32], // 0x1000
}

impl Edma {
    pub unsafe fn new() -> &'static mut Edma {
        unsafe { &mut *(DMA_BASE as *mut Edma) }
    }

    /// Write a full descriptor into a channel's TCD. The source address
    /// is left zero; `set_source` fills it per line.
    pub fn install(&mut self, channel: usize, desc: &TransferDescriptor, port_addr: usize) {
        let tcd = &self.tcd[channel];
        let attr = (desc.src_size.attr_bits() << 8) | desc.dst_size.attr_bits();
        let csr = if desc.disable_on_done { CSR_DREQ } else { 0 };
        unsafe {
            self.cerq.write(channel as u8);
            tcd.saddr.write(0);
            tcd.soff.write(desc.source_step);
            tcd.attr.write(attr);
            tcd.nbytes.write(desc.nbytes as u32);
            tcd.slast.write(desc.source_rewind);
            tcd.daddr.write(port_addr as u32);
            // The shifter buffer does not advance; 64-bit writes in
            // combined mode still land on the same doubleword.
            tcd.doff.write(0);
            tcd.citer.write(desc.iterations);
            tcd.dlastsga.write(0);
            tcd.biter.write(desc.iterations);
            tcd.csr.write(csr);
        }
    }

    #[inline(always)]
    pub fn set_source(&mut self, channel: usize, addr: usize) {
        unsafe { self.tcd[channel].saddr.write(addr as u32) };
    }

    #[inline(always)]
    pub fn enable_request(&mut self, channel: usize) {
        unsafe { self.serq.write(channel as u8) };
    }

    #[inline(always)]
    pub fn disable_request(&mut self, channel: usize) {
        unsafe { self.cerq.write(channel as u8) };
    }
}

#[repr(C)]
pub struct DmaMux {
    pub chcfg: [RW<u32>; 32],
}

impl DmaMux {
    pub unsafe fn new() -> &'static mut DmaMux {
        unsafe { &mut *(DMAMUX_BASE as *mut DmaMux) }
    }

    /// Route a peripheral request source to a channel and enable it.
    pub fn route(&mut self, channel: usize, source: u32) {
        unsafe { self.chcfg[channel].write(DMAMUX_ENBL | source) };
    }

    pub fn unroute(&mut self, channel: usize) {
        unsafe { self.chcfg[channel].write(0) };
    }
}

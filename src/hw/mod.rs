//! # i.MX RT1062 backend
//!
//! Implements [`VideoHal`] and [`AudioHal`] against the real
//! peripherals: the video PLL in the CCM analog block, FlexIO2
//! shifters, a TMR3 channel for hsync, two eDMA channels, SAI1, and a
//! GPIO bit for vsync.
//!
//! The platform's vector table must route the TMR3 interrupt to
//! [`crate::controller::VideoController::on_line_interrupt`] (the
//! [`isr`] module has a ready-made trampoline), the SAI1 interrupt to
//! [`crate::audio::AudioPump::on_sample_drain`], and the
//! software-pended slot to [`crate::audio::AudioPump::on_refill`].
//!
//! Register blocks compile on any target so the layout stays under
//! test; only the cache maintenance and the trampoline are Arm-only.

pub mod ccm;
pub mod edma;
pub mod flexio;
pub mod gpio;
pub mod nvic;
pub mod qtimer;
pub mod sai;

use crate::clock::ClockProgram;
use crate::dma::{OutputChannel, ShifterPort, TransferDescriptor};
use crate::hal::{AudioHal, VideoHal};
use crate::mode::VideoMode;
use crate::scanline::ScanlineTiming;
use crate::VgaError;

use ccm::{Ccm, CcmAnalog};
use edma::{DmaMux, Edma, DMAMUX_SRC_FLEXIO2, PRIMARY_CHANNEL, SECONDARY_CHANNEL};
use flexio::FlexIo;
use gpio::Gpio;
use nvic::Nvic;
use qtimer::TimerChannel;
use sai::Sai;

/// Iterations to wait for PLL lock. Lock takes tens of microseconds;
/// this bound is hit only if the PLL is broken or unpowered.
const LOCK_SPIN: u32 = 1_000_000;

pub struct HwVideoHal {
    ccm_analog: &'static mut CcmAnalog,
    ccm: &'static mut Ccm,
    flexio: &'static mut FlexIo,
    hsync: &'static mut TimerChannel,
    edma: &'static mut Edma,
    dmamux: &'static mut DmaMux,
    nvic: &'static mut Nvic,
    sai: &'static mut Sai,
    gpio: &'static mut Gpio,
    /// GPIO2 bit driving the vsync pin.
    vsync_mask: u32,
    pll_live: bool,
}

impl HwVideoHal {
    /// # Safety
    ///
    /// Takes ownership of the peripherals listed above. Construct at
    /// most once, and only on the RT1062.
    pub unsafe fn new(vsync_mask: u32) -> HwVideoHal {
        unsafe {
            HwVideoHal {
                ccm_analog: CcmAnalog::new(),
                ccm: Ccm::new(),
                flexio: FlexIo::new(),
                hsync: TimerChannel::hsync(),
                edma: Edma::new(),
                dmamux: DmaMux::new(),
                nvic: Nvic::new(),
                sai: Sai::new(),
                gpio: Gpio::gpio2(),
                vsync_mask,
                pll_live: false,
            }
        }
    }

    fn channel_index(channel: OutputChannel) -> usize {
        match channel {
            OutputChannel::Primary => PRIMARY_CHANNEL,
            OutputChannel::Secondary => SECONDARY_CHANNEL,
        }
    }
}

impl VideoHal for HwVideoHal {
    fn program_pll(&mut self, program: &ClockProgram) -> Result<(), VgaError> {
        if self.pll_live {
            // Fractional trims glide without dropping lock.
            self.ccm_analog.trim_video_pll(program);
            return Ok(());
        }
        self.ccm_analog.program_video_pll(program);
        let mut spins = 0;
        while !self.ccm_analog.video_pll_locked() {
            spins += 1;
            if spins > LOCK_SPIN {
                log::error!(target: "scanout", "video PLL never locked");
                return Err(VgaError::ClockLockTimeout);
            }
            core::hint::spin_loop();
        }
        self.ccm_analog.take_video_pll_live();
        self.pll_live = true;
        Ok(())
    }

    fn configure_output(&mut self, mode: &VideoMode) {
        self.ccm.gate_scanout_clocks(true);
        self.ccm.route_video_pll_to_flexio2();
        self.flexio.configure(mode);
        self.flexio.enable();
        self.hsync.configure(&ScanlineTiming::vga60());
        self.gpio.make_output(self.vsync_mask);
        self.dmamux.route(PRIMARY_CHANNEL, DMAMUX_SRC_FLEXIO2);
        self.dmamux.route(SECONDARY_CHANNEL, DMAMUX_SRC_FLEXIO2);
    }

    fn start_line_timer(&mut self) {
        self.nvic.enable(nvic::IRQ_QTIMER3, nvic::PRIO_SCANLINE);
        self.hsync.start();
    }

    #[inline(always)]
    fn clear_line_flags(&mut self) {
        self.hsync.clear_compare_flags();
    }

    #[inline(always)]
    fn set_vsync(&mut self, asserted: bool) {
        // Negative sync polarity: asserted means pin low.
        self.gpio.set(self.vsync_mask, !asserted);
    }

    fn install_descriptor(&mut self, channel: OutputChannel, desc: &TransferDescriptor) {
        let port = match desc.dest {
            ShifterPort::Primary => self.flexio.primary_port_addr(),
            ShifterPort::Secondary => self.flexio.secondary_port_addr(),
        };
        self.edma.install(Self::channel_index(channel), desc, port);
    }

    #[inline(always)]
    fn set_source(&mut self, channel: OutputChannel, addr: usize) {
        self.edma.set_source(Self::channel_index(channel), addr);
    }

    #[inline(always)]
    fn arm(&mut self, channel: OutputChannel) {
        self.edma.enable_request(Self::channel_index(channel));
    }

    #[inline(always)]
    fn disarm(&mut self, channel: OutputChannel) {
        self.edma.disable_request(Self::channel_index(channel));
    }

    #[inline(always)]
    fn flush_range(&mut self, addr: usize, len: usize) {
        flush_dcache(addr, len);
    }

    fn shutdown_output(&mut self) {
        self.hsync.stop();
        self.nvic.disable(nvic::IRQ_QTIMER3);
        self.edma.disable_request(PRIMARY_CHANNEL);
        self.edma.disable_request(SECONDARY_CHANNEL);
        self.dmamux.unroute(PRIMARY_CHANNEL);
        self.dmamux.unroute(SECONDARY_CHANNEL);
        self.flexio.disable();
        self.ccm_analog.power_down_video_pll();
        self.ccm.gate_scanout_clocks(false);
        self.pll_live = false;
    }
}

impl AudioHal for HwVideoHal {
    fn configure_audio(&mut self, sample_rate_hz: u32) {
        self.ccm.gate_audio_clock(true);
        self.sai.configure(sample_rate_hz);
        self.nvic.enable(nvic::IRQ_SAI1, nvic::PRIO_AUDIO_DRAIN);
        self.nvic.enable(nvic::IRQ_SOFTWARE, nvic::PRIO_AUDIO_REFILL);
    }

    #[inline(always)]
    fn push_sample(&mut self, sample: i16) {
        self.sai.push(sample);
    }

    #[inline(always)]
    fn pend_refill(&mut self) {
        self.nvic.pend(nvic::IRQ_SOFTWARE);
    }

    #[inline(always)]
    fn flush_audio_range(&mut self, addr: usize, len: usize) {
        flush_dcache(addr, len);
    }

    fn shutdown_audio(&mut self) {
        self.sai.shutdown();
        self.nvic.disable(nvic::IRQ_SAI1);
        self.nvic.disable(nvic::IRQ_SOFTWARE);
        self.ccm.gate_audio_clock(false);
    }
}

/// Write dirty cache lines covering `[addr, addr + len)` back to
/// memory. The eDMA engine reads through the bus, not the cache.
#[cfg(target_arch = "arm")]
fn flush_dcache(addr: usize, len: usize) {
    // SCB DCCMVAC: clean data cache line by address.
    const DCCMVAC: *mut u32 = 0xE000_EF68 as *mut u32;
    const LINE: usize = 32;
    let mut line = addr & !(LINE - 1);
    while line < addr + len {
        unsafe { core::ptr::write_volatile(DCCMVAC, line as u32) };
        line += LINE;
    }
    unsafe { core::arch::asm!("dsb", "isb") };
}

#[cfg(not(target_arch = "arm"))]
fn flush_dcache(_addr: usize, _len: usize) {}

/// Vector-table trampoline for the line interrupt.
#[cfg(target_arch = "arm")]
pub mod isr {
    use core::sync::atomic::{AtomicPtr, Ordering};

    use super::HwVideoHal;
    use crate::controller::VideoController;

    static CONTROLLER: AtomicPtr<VideoController<HwVideoHal>> =
        AtomicPtr::new(core::ptr::null_mut());

    /// Register the controller the TMR3 interrupt dispatches to.
    ///
    /// # Safety
    ///
    /// `controller` must stay valid (and pinned) until unbound with a
    /// null pointer.
    pub unsafe fn bind(controller: *mut VideoController<HwVideoHal>) {
        CONTROLLER.store(controller, Ordering::Release);
    }

    #[no_mangle]
    pub extern "C" fn qtimer3_isr() {
        let p = CONTROLLER.load(Ordering::Acquire);
        if !p.is_null() {
            unsafe { (*p).on_line_interrupt() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_blocks_have_documented_offsets() {
        assert_eq!(core::mem::offset_of!(FlexIo, shiftsden), 0x30);
        assert_eq!(core::mem::offset_of!(FlexIo, shiftctl), 0x80);
        assert_eq!(core::mem::offset_of!(FlexIo, shiftbuf), 0x200);
        assert_eq!(core::mem::offset_of!(FlexIo, timcmp), 0x500);
        assert_eq!(core::mem::offset_of!(FlexIo, shiftbufnbs), 0x680);

        assert_eq!(core::mem::offset_of!(Edma, cerq), 0x1A);
        assert_eq!(core::mem::offset_of!(Edma, serq), 0x1B);
        assert_eq!(core::mem::offset_of!(Edma, tcd), 0x1000);
        assert_eq!(core::mem::size_of::<edma::Tcd>(), 32);

        assert_eq!(core::mem::offset_of!(CcmAnalog, pll_video), 0xA0);
        assert_eq!(core::mem::offset_of!(CcmAnalog, pll_video_num), 0xB0);
        assert_eq!(core::mem::offset_of!(CcmAnalog, pll_video_denom), 0xC0);
        assert_eq!(core::mem::offset_of!(Ccm, ccgr0), 0x68);

        assert_eq!(core::mem::size_of::<TimerChannel>(), 0x20);
        assert_eq!(core::mem::offset_of!(Gpio, dr_set), 0x84);
        assert_eq!(core::mem::offset_of!(Sai, tdr), 0x20);
    }
}

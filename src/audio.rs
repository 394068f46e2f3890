//! # Audio Sample Pump
//!
//! Ping-pong playback buffer for the audio interface that shares the
//! device with scanout. Two interrupt levels cooperate:
//!
//! * the sample-drain interrupt (high priority, one per sample period)
//!   feeds the next sample to the transmit register, and
//! * a software-pended refill interrupt (low priority) regenerates a
//!   buffer half once the drain has moved off it.
//!
//! The drain never waits on the refill: while one half plays, the other
//! is being rewritten. The refill callback runs below the scanline
//! interrupt's priority, so a slow audio generator degrades audio, not
//! video.

use core::sync::atomic::{AtomicBool, Ordering};

use alloc::vec::Vec;

use crate::hal::AudioHal;
use crate::VgaError;

/// Default sample rate, matching the low-rate PCM assets this device
/// class ships with.
pub const SAMPLE_RATE_HZ: u32 = 11_025;

/// Fills one buffer half with fresh samples.
pub type RefillFn = fn(&mut [i16]);

#[derive(Debug)]
pub struct AudioPump {
    /// Two halves of `half_len` samples each.
    buffer: Vec<i16>,
    half_len: usize,
    /// Next sample to play. Only the drain interrupt touches it.
    cursor: usize,
    /// Set by the drain when a half finishes playing, cleared by the
    /// refill once that half is rewritten.
    first_half_drained: AtomicBool,
    second_half_drained: AtomicBool,
    refill: RefillFn,
}

impl AudioPump {
    /// Allocate the ping-pong buffer and bring up the audio interface.
    /// Both halves start silent; the first refill is pended by the
    /// drain, not here. A zero `half_len` is rejected before any
    /// hardware is touched, since the drain has nothing to play from.
    pub fn begin<H: AudioHal>(
        hal: &mut H,
        sample_rate_hz: u32,
        half_len: usize,
        refill: RefillFn,
    ) -> Result<AudioPump, VgaError> {
        if half_len == 0 {
            return Err(VgaError::AllocationFailed);
        }
        let len = half_len * 2;
        let mut buffer = Vec::new();
        if buffer.try_reserve_exact(len).is_err() {
            log::warn!("could not allocate {len} sample audio buffer");
            return Err(VgaError::AllocationFailed);
        }
        buffer.resize(len, 0);

        hal.configure_audio(sample_rate_hz);
        log::info!(target: "audio", "audio up: {sample_rate_hz} Hz, {half_len} samples/half");

        Ok(AudioPump {
            buffer,
            half_len,
            cursor: 0,
            first_half_drained: AtomicBool::new(false),
            second_half_drained: AtomicBool::new(false),
            refill,
        })
    }

    /// Stop sample interrupts. The buffer is freed when the pump drops.
    pub fn end<H: AudioHal>(&mut self, hal: &mut H) {
        hal.shutdown_audio();
        log::info!(target: "audio", "audio down");
    }

    /// Sample-drain interrupt body: feed one sample, and when a half
    /// boundary is crossed, mark the drained half and pend the refill.
    pub fn on_sample_drain<H: AudioHal>(&mut self, hal: &mut H) {
        hal.push_sample(self.buffer[self.cursor]);
        self.cursor += 1;
        if self.cursor == self.half_len {
            self.first_half_drained.store(true, Ordering::Relaxed);
            hal.pend_refill();
        } else if self.cursor == self.half_len * 2 {
            self.cursor = 0;
            self.second_half_drained.store(true, Ordering::Relaxed);
            hal.pend_refill();
        }
    }

    /// Refill interrupt body: rewrite whichever halves have drained and
    /// write their cache lines back for the transmit DMA path.
    pub fn on_refill<H: AudioHal>(&mut self, hal: &mut H) {
        if self.first_half_drained.swap(false, Ordering::Relaxed) {
            let half = &mut self.buffer[..self.half_len];
            (self.refill)(half);
            hal.flush_audio_range(half.as_ptr() as usize, core::mem::size_of_val(half));
        }
        if self.second_half_drained.swap(false, Ordering::Relaxed) {
            let start = self.half_len;
            let half = &mut self.buffer[start..];
            (self.refill)(half);
            hal.flush_audio_range(half.as_ptr() as usize, core::mem::size_of_val(half));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHal;

    fn ramp(half: &mut [i16]) {
        for (i, s) in half.iter_mut().enumerate() {
            *s = i as i16 + 1;
        }
    }

    #[test]
    fn zero_length_buffer_is_rejected() {
        let mut hal = SimHal::new();
        assert_eq!(
            AudioPump::begin(&mut hal, SAMPLE_RATE_HZ, 0, ramp).unwrap_err(),
            VgaError::AllocationFailed
        );
        // Rejected before the interface was brought up.
        assert_eq!(hal.audio_sample_rate, None);
    }

    #[test]
    fn begin_configures_the_interface() {
        let mut hal = SimHal::new();
        let _pump = AudioPump::begin(&mut hal, SAMPLE_RATE_HZ, 64, ramp).unwrap();
        assert_eq!(hal.audio_sample_rate, Some(11_025));
    }

    #[test]
    fn halves_pend_refills_as_they_drain() {
        let mut hal = SimHal::new();
        let mut pump = AudioPump::begin(&mut hal, SAMPLE_RATE_HZ, 4, ramp).unwrap();

        for _ in 0..4 {
            pump.on_sample_drain(&mut hal);
        }
        assert_eq!(hal.refill_pends, 1);
        for _ in 0..4 {
            pump.on_sample_drain(&mut hal);
        }
        assert_eq!(hal.refill_pends, 2);
        assert_eq!(pump.cursor, 0);
        // Both halves started silent.
        assert_eq!(hal.samples, [0i16; 8]);
    }

    #[test]
    fn refill_rewrites_only_drained_halves() {
        let mut hal = SimHal::new();
        let mut pump = AudioPump::begin(&mut hal, SAMPLE_RATE_HZ, 4, ramp).unwrap();

        // Nothing drained yet, so nothing is rewritten.
        pump.on_refill(&mut hal);
        assert!(hal.audio_flushes.is_empty());

        for _ in 0..4 {
            pump.on_sample_drain(&mut hal);
        }
        pump.on_refill(&mut hal);
        assert_eq!(hal.audio_flushes.len(), 1);
        assert_eq!(hal.audio_flushes[0].1, 4 * core::mem::size_of::<i16>());
        assert_eq!(&pump.buffer[..4], &[1, 2, 3, 4]);
        assert_eq!(&pump.buffer[4..], &[0, 0, 0, 0]);

        // The still-silent second half plays next; the refilled first
        // half follows once the cursor wraps.
        for _ in 0..8 {
            pump.on_sample_drain(&mut hal);
        }
        assert_eq!(&hal.samples[4..8], &[0, 0, 0, 0]);
        assert_eq!(&hal.samples[8..12], &[1, 2, 3, 4]);
    }

    #[test]
    fn missed_refill_catches_up_on_both_halves() {
        let mut hal = SimHal::new();
        let mut pump = AudioPump::begin(&mut hal, SAMPLE_RATE_HZ, 4, ramp).unwrap();
        for _ in 0..8 {
            pump.on_sample_drain(&mut hal);
        }
        pump.on_refill(&mut hal);
        assert_eq!(hal.audio_flushes.len(), 2);
        assert_eq!(&pump.buffer[..], &[1, 2, 3, 4, 1, 2, 3, 4]);
    }
}

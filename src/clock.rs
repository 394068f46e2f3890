//! # Clock Synthesizer
//!
//! The video PLL multiplies a fixed 24 MHz reference by
//! `div_select + num/denom`, then a post divider of 1, 2 or 4 brings the
//! result down to the FlexIO clock. [`ClockProgram::synthesize`]
//! searches that space for the rational program closest to a target
//! frequency; programming the hardware and spinning on the lock bit is
//! the hal's job ([`VideoHal::program_pll`](crate::hal::VideoHal)).
//!
//! The loop divider only accepts 27..=54, so low targets are reached by
//! raising the post divider rather than dropping the divider out of
//! range. With a 10000 denominator the worst-case synthesis error is a
//! fraction of a kHz, far inside the 0.5% tolerance a VGA monitor's
//! PLL will track.

use crate::VgaError;

/// PLL reference frequency, kHz.
pub const REF_KHZ: u32 = 24_000;
/// Fixed fractional denominator.
pub const DENOM: u32 = 10_000;
/// Valid loop-divider range for the video PLL.
pub const DIV_SELECT_MIN: u32 = 27;
pub const DIV_SELECT_MAX: u32 = 54;

/// FlexIO clock target: 10× the reference 25.175 MHz pixel clock, so
/// the 640-wide mode lands on an integral shifter divisor.
pub const FLEXIO_CLOCK_KHZ: u32 = 251_760;

/// Synthesis must come within 0.5% of the target (per mille here).
const MAX_ERROR_PER_MILLE: u64 = 5;

/// A rational PLL program: `out = REF * (div_select + num/denom) / post_div`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClockProgram {
    pub div_select: u32,
    pub num: u32,
    pub denom: u32,
    pub post_div: u32,
}

impl ClockProgram {
    /// Find the program whose output is closest to `target_khz`.
    ///
    /// Returns `ModeUnsupported` if no in-range program comes within
    /// tolerance, which for sane targets never happens.
    pub fn synthesize(target_khz: u32) -> Result<ClockProgram, VgaError> {
        let mut best: Option<(u64, ClockProgram)> = None;

        for post_div in [1u32, 2, 4] {
            // PLL output needed before the post divider.
            let pll_khz = target_khz as u64 * post_div as u64;
            for div_select in DIV_SELECT_MIN..=DIV_SELECT_MAX {
                let base = div_select as u64 * REF_KHZ as u64;
                if pll_khz < base {
                    continue;
                }
                let num = ((pll_khz - base) * DENOM as u64 + REF_KHZ as u64 / 2)
                    / REF_KHZ as u64;
                if num >= DENOM as u64 {
                    continue;
                }
                let candidate = ClockProgram {
                    div_select,
                    num: num as u32,
                    denom: DENOM,
                    post_div,
                };
                let err = (candidate.output_khz() as u64).abs_diff(target_khz as u64);
                if best.map_or(true, |(best_err, _)| err < best_err) {
                    best = Some((err, candidate));
                }
            }
        }

        let (err, program) = best.ok_or(VgaError::ModeUnsupported)?;
        if err * 1000 > target_khz as u64 * MAX_ERROR_PER_MILLE {
            return Err(VgaError::ModeUnsupported);
        }
        log::debug!(
            "clock: target {} kHz -> div {} + {}/{} post /{} ({} kHz)",
            target_khz,
            program.div_select,
            program.num,
            program.denom,
            program.post_div,
            program.output_khz()
        );
        Ok(program)
    }

    /// The frequency this program produces, kHz.
    pub fn output_khz(&self) -> u32 {
        let pll = REF_KHZ as u64 * self.div_select as u64
            + REF_KHZ as u64 * self.num as u64 / self.denom as u64;
        (pll / self.post_div as u64) as u32
    }

    /// Apply live deltas to the fraction for runtime fine adjustment.
    /// Saturates rather than producing an invalid program.
    pub fn adjusted(&self, num_delta: i32, denom_delta: i32) -> ClockProgram {
        let denom = (self.denom as i64 + denom_delta as i64).clamp(1, u32::MAX as i64) as u32;
        let num = (self.num as i64 + num_delta as i64).clamp(0, denom as i64 - 1) as u32;
        ClockProgram { num, denom, ..*self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flexio_target_synthesizes_exactly() {
        let p = ClockProgram::synthesize(FLEXIO_CLOCK_KHZ).unwrap();
        assert_eq!(p.output_khz(), FLEXIO_CLOCK_KHZ);
        assert_eq!((p.div_select, p.num, p.post_div), (41, 9600, 4));
    }

    #[test]
    fn sweep_stays_within_tolerance_and_range() {
        // From just above the lowest reachable output up through the
        // fastest program the divider range allows.
        for target in (170_000..1_290_000).step_by(7_321) {
            let p = match ClockProgram::synthesize(target) {
                Ok(p) => p,
                Err(_) => continue,
            };
            assert!(
                (DIV_SELECT_MIN..=DIV_SELECT_MAX).contains(&p.div_select),
                "divider {} out of range for target {target}",
                p.div_select
            );
            assert!(p.num < p.denom);
            let err = (p.output_khz() as i64 - target as i64).unsigned_abs();
            assert!(
                err * 1000 <= target as u64 * 5,
                "target {target}: got {} kHz",
                p.output_khz()
            );
        }
    }

    #[test]
    fn unreachable_target_is_rejected() {
        // Far below what div 27 with post divider 4 can produce.
        assert_eq!(
            ClockProgram::synthesize(10_000),
            Err(VgaError::ModeUnsupported)
        );
    }

    #[test]
    fn adjusted_clamps_fraction() {
        let p = ClockProgram::synthesize(FLEXIO_CLOCK_KHZ).unwrap();
        let up = p.adjusted(150, 0);
        assert_eq!(up.num, p.num + 150);
        assert_eq!(up.div_select, p.div_select);
        let floor = p.adjusted(-(DENOM as i32 * 2), 0);
        assert_eq!(floor.num, 0);
    }
}

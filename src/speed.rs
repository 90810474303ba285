//! Playback speed.

use crate::{MAX_BUFFER_BYTES, SCRATCH_BYTES};
use fixed::types::U32F32;

/// Source-to-output stride of the player.
///
/// Output sample `j` is taken from source sample `floor(j * speed)`, and each
/// period consumes `floor(speed * MAX_BUFFER_BYTES)` source bytes so the output
/// cadence stays real-time. 1.0 is identity, 2.0 plays at double rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlaybackSpeed(U32F32);

// One period at the fastest speed must fit the scratch buffer.
const _: () = assert!(MAX_BUFFER_BYTES * 2 <= SCRATCH_BYTES);

impl PlaybackSpeed {
    /// Slowest supported speed. Same value as `0.1f32` (13421773 * 2^-27).
    pub const MIN: Self = Self(U32F32::from_bits(13_421_773 << 5));
    /// Fastest supported speed.
    pub const MAX: Self = Self(U32F32::lit("2"));
    /// Original speed.
    pub const NORMAL: Self = Self(U32F32::lit("1"));

    /// Clamp `speed` into [`PlaybackSpeed::MIN`, `PlaybackSpeed::MAX`].
    /// NaN and non-positive values become MIN.
    ///
    /// Every f32 in range is stored exactly, so the stride is the requested speed.
    pub fn new(speed: f32) -> Self {
        if !(speed > Self::MIN.as_f32()) {
            Self::MIN
        } else if speed > Self::MAX.as_f32() {
            Self::MAX
        } else {
            Self(U32F32::from_num(speed))
        }
    }

    pub fn as_f32(self) -> f32 {
        self.0.to_num::<f32>()
    }

    /// Source sample index played at output sample `index`.
    #[inline]
    pub(crate) fn source_index(self, index: u32) -> u32 {
        self.0.saturating_mul_int(u64::from(index)).to_num::<u32>()
    }

    /// Source bytes consumed per period, before alignment to whole samples.
    #[inline]
    pub(crate) fn bytes_per_period(self) -> usize {
        self.0
            .saturating_mul_int(MAX_BUFFER_BYTES as u64)
            .to_num::<usize>()
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clamp() {
        assert_eq!(PlaybackSpeed::new(0.0), PlaybackSpeed::MIN);
        assert_eq!(PlaybackSpeed::new(-3.0), PlaybackSpeed::MIN);
        assert_eq!(PlaybackSpeed::new(0.05), PlaybackSpeed::MIN);
        assert_eq!(PlaybackSpeed::new(f32::NAN), PlaybackSpeed::MIN);
        assert_eq!(PlaybackSpeed::new(2.5), PlaybackSpeed::MAX);
        assert_eq!(PlaybackSpeed::new(f32::INFINITY), PlaybackSpeed::MAX);
    }

    #[test]
    fn boundaries_are_kept() {
        assert_eq!(PlaybackSpeed::new(0.1), PlaybackSpeed::MIN);
        assert_eq!(PlaybackSpeed::new(2.0), PlaybackSpeed::MAX);
        assert_eq!(PlaybackSpeed::MIN.as_f32(), 0.1);
        assert_eq!(PlaybackSpeed::new(1.2).as_f32(), 1.2);
        assert_eq!(PlaybackSpeed::new(0.3).as_f32(), 0.3);
        assert_relative_eq!(PlaybackSpeed::MAX.as_f32(), 2.0);
        assert_relative_eq!(PlaybackSpeed::new(0.75).as_f32(), 0.75);
    }

    #[test]
    fn stride() {
        let normal = PlaybackSpeed::NORMAL;
        assert_eq!(normal.source_index(0), 0);
        assert_eq!(normal.source_index(511), 511);
        assert_eq!(normal.bytes_per_period(), 512);

        let double = PlaybackSpeed::MAX;
        assert_eq!(double.source_index(511), 1022);
        assert_eq!(double.bytes_per_period(), SCRATCH_BYTES);

        let half = PlaybackSpeed::new(0.5);
        assert_eq!(half.source_index(5), 2);
        assert_eq!(half.bytes_per_period(), 256);

        // 0.1 * 512 = 51.2
        assert_eq!(PlaybackSpeed::MIN.bytes_per_period(), 51);
        assert_eq!(PlaybackSpeed::MIN.source_index(10), 1);
    }

    #[test]
    fn stride_is_exact_for_non_binary_fractions() {
        for speed in [1.2f32, 1.7, 0.3, 0.1] {
            let stride = PlaybackSpeed::new(speed);
            for index in 0..512u32 {
                let expected = (f64::from(index) * f64::from(speed)).floor() as u32;
                assert_eq!(stride.source_index(index), expected, "speed {} index {}", speed, index);
            }
            let period = (f64::from(speed) * 512.0).floor() as usize;
            assert_eq!(stride.bytes_per_period(), period, "speed {}", speed);
        }

        // 5 * 1.2 = 6
        assert_eq!(PlaybackSpeed::new(1.2).source_index(5), 6);
        assert_eq!(PlaybackSpeed::new(1.2).bytes_per_period(), 614);
    }
}

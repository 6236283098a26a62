//! Candle geometry and TA-Lib candle settings.
//!
//! Every recognizer compares a bar's real body, shadows, or range against a
//! trailing average of the same measure over the preceding bars. The
//! averaging period and factor per measure follow TA-Lib's defaults.

use crate::domain::Bar;

/// Which measure of a candle a setting averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeType {
    RealBody,
    HighLow,
    Shadows,
}

/// Named comparison thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    BodyLong,
    BodyVeryLong,
    BodyShort,
    BodyDoji,
    ShadowLong,
    ShadowVeryLong,
    ShadowShort,
    ShadowVeryShort,
    Near,
    Far,
    Equal,
}

/// Averaging parameters for a [`Setting`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleSetting {
    pub range_type: RangeType,
    /// Number of preceding bars averaged. 0 means "the bar itself".
    pub period: usize,
    pub factor: f64,
}

impl Setting {
    pub const fn params(self) -> CandleSetting {
        let (range_type, period, factor) = match self {
            Setting::BodyLong => (RangeType::RealBody, 10, 1.0),
            Setting::BodyVeryLong => (RangeType::RealBody, 10, 3.0),
            Setting::BodyShort => (RangeType::RealBody, 10, 1.0),
            Setting::BodyDoji => (RangeType::HighLow, 10, 0.1),
            Setting::ShadowLong => (RangeType::RealBody, 0, 1.0),
            Setting::ShadowVeryLong => (RangeType::RealBody, 0, 2.0),
            Setting::ShadowShort => (RangeType::Shadows, 10, 1.0),
            Setting::ShadowVeryShort => (RangeType::HighLow, 10, 0.1),
            Setting::Near => (RangeType::HighLow, 5, 0.2),
            Setting::Far => (RangeType::HighLow, 5, 0.6),
            Setting::Equal => (RangeType::HighLow, 5, 0.05),
        };
        CandleSetting {
            range_type,
            period,
            factor,
        }
    }

    pub const fn period(self) -> usize {
        self.params().period
    }
}

/// Read-only candle accessors over a bar slice.
#[derive(Debug, Clone, Copy)]
pub struct Candles<'a> {
    bars: &'a [Bar],
}

impl<'a> Candles<'a> {
    pub fn new(bars: &'a [Bar]) -> Self {
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn open(&self, i: usize) -> f64 {
        self.bars[i].open
    }

    #[inline]
    pub fn high(&self, i: usize) -> f64 {
        self.bars[i].high
    }

    #[inline]
    pub fn low(&self, i: usize) -> f64 {
        self.bars[i].low
    }

    #[inline]
    pub fn close(&self, i: usize) -> f64 {
        self.bars[i].close
    }

    #[inline]
    pub fn real_body(&self, i: usize) -> f64 {
        (self.close(i) - self.open(i)).abs()
    }

    #[inline]
    pub fn upper_shadow(&self, i: usize) -> f64 {
        self.high(i) - self.body_top(i)
    }

    #[inline]
    pub fn lower_shadow(&self, i: usize) -> f64 {
        self.body_bottom(i) - self.low(i)
    }

    #[inline]
    pub fn high_low_range(&self, i: usize) -> f64 {
        self.high(i) - self.low(i)
    }

    #[inline]
    pub fn body_top(&self, i: usize) -> f64 {
        self.open(i).max(self.close(i))
    }

    #[inline]
    pub fn body_bottom(&self, i: usize) -> f64 {
        self.open(i).min(self.close(i))
    }

    /// +1 for white (close >= open), -1 for black.
    #[inline]
    pub fn color(&self, i: usize) -> i32 {
        if self.close(i) >= self.open(i) {
            1
        } else {
            -1
        }
    }

    #[inline]
    pub fn white(&self, i: usize) -> bool {
        self.color(i) == 1
    }

    #[inline]
    pub fn black(&self, i: usize) -> bool {
        self.color(i) == -1
    }

    fn range_of(&self, range_type: RangeType, i: usize) -> f64 {
        match range_type {
            RangeType::RealBody => self.real_body(i),
            RangeType::HighLow => self.high_low_range(i),
            RangeType::Shadows => self.upper_shadow(i) + self.lower_shadow(i),
        }
    }

    /// Threshold for `setting` as seen from bar `i`: factor times the mean
    /// measure over the `period` bars before `i` (or bar `i` itself when the
    /// period is 0). Shadow averages are halved to a per-shadow value.
    pub fn avg(&self, setting: Setting, i: usize) -> f64 {
        let p = setting.params();
        let base = if p.period == 0 {
            self.range_of(p.range_type, i)
        } else {
            let start = i.saturating_sub(p.period);
            let n = i - start;
            if n == 0 {
                self.range_of(p.range_type, i)
            } else {
                (start..i).map(|j| self.range_of(p.range_type, j)).sum::<f64>() / n as f64
            }
        };
        let divisor = if p.range_type == RangeType::Shadows { 2.0 } else { 1.0 };
        p.factor * base / divisor
    }

    /// Real body of `later` entirely above the real body of `earlier`.
    #[inline]
    pub fn real_body_gap_up(&self, later: usize, earlier: usize) -> bool {
        self.body_bottom(later) > self.body_top(earlier)
    }

    #[inline]
    pub fn real_body_gap_down(&self, later: usize, earlier: usize) -> bool {
        self.body_top(later) < self.body_bottom(earlier)
    }

    /// Full range of `later` entirely above `earlier`.
    #[inline]
    pub fn candle_gap_up(&self, later: usize, earlier: usize) -> bool {
        self.low(later) > self.high(earlier)
    }

    #[inline]
    pub fn candle_gap_down(&self, later: usize, earlier: usize) -> bool {
        self.high(later) < self.low(earlier)
    }
}

/// `value` when `hit`, otherwise 0.
#[inline]
pub(crate) fn signal(hit: bool, value: i32) -> i32 {
    if hit {
        value
    } else {
        0
    }
}

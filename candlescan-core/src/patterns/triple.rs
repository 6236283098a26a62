//! Three-candle recognizers. The final bar is `i`; bars `i - 2` and `i - 1`
//! form the setup.

use super::candle::{signal, Candles, Setting as S};

const STAR_PENETRATION: f64 = 0.3;

pub fn two_crows(c: &Candles, i: usize) -> i32 {
    let hit = c.white(i - 2)
        && c.real_body(i - 2) > c.avg(S::BodyLong, i - 2)
        && c.black(i - 1)
        && c.real_body_gap_up(i - 1, i - 2)
        && c.black(i)
        && c.open(i) < c.open(i - 1)
        && c.open(i) > c.close(i - 1)
        && c.close(i) > c.open(i - 2)
        && c.close(i) < c.close(i - 2);
    signal(hit, -100)
}

pub fn three_black_crows(c: &Candles, i: usize) -> i32 {
    let short_lower = |j: usize| c.lower_shadow(j) < c.avg(S::ShadowVeryShort, j);
    let hit = c.white(i - 3)
        && c.black(i - 2)
        && short_lower(i - 2)
        && c.black(i - 1)
        && short_lower(i - 1)
        && c.black(i)
        && short_lower(i)
        && c.open(i - 1) < c.open(i - 2)
        && c.open(i - 1) > c.close(i - 2)
        && c.open(i) < c.open(i - 1)
        && c.open(i) > c.close(i - 1)
        && c.high(i - 3) > c.close(i - 2)
        && c.close(i - 2) > c.close(i - 1)
        && c.close(i - 1) > c.close(i);
    signal(hit, -100)
}

pub fn three_inside(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i - 2) > c.avg(S::BodyLong, i - 2)
        && c.real_body(i - 1) <= c.avg(S::BodyShort, i - 1)
        && c.body_top(i - 1) < c.body_top(i - 2)
        && c.body_bottom(i - 1) > c.body_bottom(i - 2)
        && ((c.white(i - 2) && c.black(i) && c.close(i) < c.open(i - 2))
            || (c.black(i - 2) && c.white(i) && c.close(i) > c.open(i - 2)));
    signal(hit, -c.color(i - 2) * 100)
}

pub fn three_outside(c: &Candles, i: usize) -> i32 {
    let hit = (c.white(i - 1)
        && c.black(i - 2)
        && c.close(i - 1) > c.open(i - 2)
        && c.open(i - 1) < c.close(i - 2)
        && c.close(i) > c.close(i - 1))
        || (c.black(i - 1)
            && c.white(i - 2)
            && c.open(i - 1) > c.close(i - 2)
            && c.close(i - 1) < c.open(i - 2)
            && c.close(i) < c.close(i - 1));
    signal(hit, c.color(i - 1) * 100)
}

pub fn three_stars_in_south(c: &Candles, i: usize) -> i32 {
    let hit = c.black(i - 2)
        && c.black(i - 1)
        && c.black(i)
        && c.real_body(i - 2) > c.avg(S::BodyLong, i - 2)
        && c.lower_shadow(i - 2) > c.avg(S::ShadowLong, i - 2)
        && c.real_body(i - 1) < c.real_body(i - 2)
        && c.open(i - 1) > c.close(i - 2)
        && c.open(i - 1) <= c.high(i - 2)
        && c.low(i - 1) < c.close(i - 2)
        && c.low(i - 1) >= c.low(i - 2)
        && c.lower_shadow(i - 1) > c.avg(S::ShadowVeryShort, i - 1)
        && c.real_body(i) < c.avg(S::BodyShort, i)
        && c.lower_shadow(i) < c.avg(S::ShadowVeryShort, i)
        && c.upper_shadow(i) < c.avg(S::ShadowVeryShort, i)
        && c.low(i) > c.low(i - 1)
        && c.high(i) < c.high(i - 1);
    signal(hit, 100)
}

pub fn three_white_soldiers(c: &Candles, i: usize) -> i32 {
    let short_upper = |j: usize| c.upper_shadow(j) < c.avg(S::ShadowVeryShort, j);
    let hit = c.white(i - 2)
        && short_upper(i - 2)
        && c.white(i - 1)
        && short_upper(i - 1)
        && c.white(i)
        && short_upper(i)
        && c.close(i) > c.close(i - 1)
        && c.close(i - 1) > c.close(i - 2)
        && c.open(i - 1) > c.open(i - 2)
        && c.open(i - 1) <= c.close(i - 2) + c.avg(S::Near, i - 2)
        && c.open(i) > c.open(i - 1)
        && c.open(i) <= c.close(i - 1) + c.avg(S::Near, i - 1)
        && c.real_body(i - 1) > c.real_body(i - 2) - c.avg(S::Far, i - 2)
        && c.real_body(i) > c.real_body(i - 1) - c.avg(S::Far, i - 1)
        && c.real_body(i) > c.avg(S::BodyShort, i);
    signal(hit, 100)
}

pub fn abandoned_baby(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i - 2) > c.avg(S::BodyLong, i - 2)
        && c.real_body(i - 1) <= c.avg(S::BodyDoji, i - 1)
        && c.real_body(i) > c.avg(S::BodyShort, i)
        && ((c.white(i - 2)
            && c.black(i)
            && c.close(i) < c.close(i - 2) - c.real_body(i - 2) * STAR_PENETRATION
            && c.candle_gap_up(i - 1, i - 2)
            && c.candle_gap_down(i, i - 1))
            || (c.black(i - 2)
                && c.white(i)
                && c.close(i) > c.close(i - 2) + c.real_body(i - 2) * STAR_PENETRATION
                && c.candle_gap_down(i - 1, i - 2)
                && c.candle_gap_up(i, i - 1)));
    signal(hit, c.color(i) * 100)
}

/// Three advancing white candles whose momentum visibly fades.
pub fn advance_block(c: &Candles, i: usize) -> i32 {
    let rb = |j: usize| c.real_body(j);
    let setup = c.white(i - 2)
        && c.white(i - 1)
        && c.white(i)
        && c.close(i) > c.close(i - 1)
        && c.close(i - 1) > c.close(i - 2)
        && c.open(i - 1) > c.open(i - 2)
        && c.open(i - 1) <= c.close(i - 2) + c.avg(S::Near, i - 2)
        && c.open(i) > c.open(i - 1)
        && c.open(i) <= c.close(i - 1) + c.avg(S::Near, i - 1)
        && rb(i - 2) > c.avg(S::BodyLong, i - 2)
        && c.upper_shadow(i - 2) < c.avg(S::ShadowShort, i - 2);
    if !setup {
        return 0;
    }
    let blocked_on_second =
        rb(i - 1) < rb(i - 2) - c.avg(S::Far, i - 2) && rb(i) < rb(i - 1) + c.avg(S::Near, i - 1);
    let blocked_on_third = rb(i) < rb(i - 1) - c.avg(S::Far, i - 1);
    let shrinking_with_shadows = rb(i) < rb(i - 1)
        && rb(i - 1) < rb(i - 2)
        && (c.upper_shadow(i) > c.avg(S::ShadowShort, i) || c.upper_shadow(i - 1) > c.avg(S::ShadowShort, i - 1));
    let long_upper_on_third = rb(i) < rb(i - 1) && c.upper_shadow(i) > c.avg(S::ShadowLong, i);
    signal(
        blocked_on_second || blocked_on_third || shrinking_with_shadows || long_upper_on_third,
        -100,
    )
}

fn star(c: &Candles, i: usize, middle: S, bullish: bool) -> bool {
    let first_color_ok = if bullish { c.black(i - 2) } else { c.white(i - 2) };
    let gap = if bullish {
        c.real_body_gap_down(i - 1, i - 2)
    } else {
        c.real_body_gap_up(i - 1, i - 2)
    };
    let last_color_ok = if bullish { c.white(i) } else { c.black(i) };
    let penetrates = if bullish {
        c.close(i) > c.close(i - 2) + c.real_body(i - 2) * STAR_PENETRATION
    } else {
        c.close(i) < c.close(i - 2) - c.real_body(i - 2) * STAR_PENETRATION
    };
    c.real_body(i - 2) > c.avg(S::BodyLong, i - 2)
        && first_color_ok
        && c.real_body(i - 1) <= c.avg(middle, i - 1)
        && gap
        && c.real_body(i) > c.avg(S::BodyShort, i)
        && last_color_ok
        && penetrates
}

pub fn evening_doji_star(c: &Candles, i: usize) -> i32 {
    signal(star(c, i, S::BodyDoji, false), -100)
}

pub fn evening_star(c: &Candles, i: usize) -> i32 {
    signal(star(c, i, S::BodyShort, false), -100)
}

pub fn morning_doji_star(c: &Candles, i: usize) -> i32 {
    signal(star(c, i, S::BodyDoji, true), 100)
}

pub fn morning_star(c: &Candles, i: usize) -> i32 {
    signal(star(c, i, S::BodyShort, true), 100)
}

pub fn gap_side_side_white(c: &Candles, i: usize) -> i32 {
    let up = c.real_body_gap_up(i - 1, i - 2) && c.real_body_gap_up(i, i - 2);
    let down = c.real_body_gap_down(i - 1, i - 2) && c.real_body_gap_down(i, i - 2);
    let near = c.avg(S::Near, i - 1);
    let eq = c.avg(S::Equal, i - 1);
    let hit = (up || down)
        && c.white(i - 1)
        && c.white(i)
        && c.real_body(i) >= c.real_body(i - 1) - near
        && c.real_body(i) <= c.real_body(i - 1) + near
        && c.open(i) >= c.open(i - 1) - eq
        && c.open(i) <= c.open(i - 1) + eq;
    signal(hit, if up { 100 } else { -100 })
}

/// Inside bar followed by a false breakout, with confirmation within three
/// bars. Carries state from earlier bars, so the window before `i` is replayed.
pub fn hikkake(c: &Candles, i: usize) -> i32 {
    let setup = |j: usize| {
        c.high(j - 1) < c.high(j - 2)
            && c.low(j - 1) > c.low(j - 2)
            && ((c.high(j) < c.high(j - 1) && c.low(j) < c.low(j - 1))
                || (c.high(j) > c.high(j - 1) && c.low(j) > c.low(j - 1)))
    };
    replay_breakout(c, i, 2, setup)
}

/// Shared state machine for the hikkake family.
///
/// Returns ±100 on the setup bar, ±200 on the bar that confirms it, 0 otherwise.
pub(crate) fn replay_breakout(c: &Candles, i: usize, first_setup_bar: usize, setup: impl Fn(usize) -> bool) -> i32 {
    let mut pattern_idx = 0usize;
    let mut pattern_result = 0i32;
    let start = i.saturating_sub(3).max(first_setup_bar);

    for j in start..=i {
        if setup(j) {
            pattern_result = if c.high(j) < c.high(j - 1) { 100 } else { -100 };
            pattern_idx = j;
            if j == i {
                return pattern_result;
            }
        } else if pattern_idx > 0
            && j <= pattern_idx + 3
            && ((pattern_result > 0 && c.close(j) > c.high(pattern_idx - 1))
                || (pattern_result < 0 && c.close(j) < c.low(pattern_idx - 1)))
        {
            pattern_idx = 0;
            if j == i {
                return pattern_result + pattern_result.signum() * 100;
            }
        }
    }
    0
}

pub fn identical_three_crows(c: &Candles, i: usize) -> i32 {
    let short_lower = |j: usize| c.lower_shadow(j) < c.avg(S::ShadowVeryShort, j);
    let eq2 = c.avg(S::Equal, i - 2);
    let eq1 = c.avg(S::Equal, i - 1);
    let hit = c.black(i - 2)
        && short_lower(i - 2)
        && c.black(i - 1)
        && short_lower(i - 1)
        && c.black(i)
        && short_lower(i)
        && c.close(i - 2) > c.close(i - 1)
        && c.close(i - 1) > c.close(i)
        && c.open(i - 1) <= c.close(i - 2) + eq2
        && c.open(i - 1) >= c.close(i - 2) - eq2
        && c.open(i) <= c.close(i - 1) + eq1
        && c.open(i) >= c.close(i - 1) - eq1;
    signal(hit, -100)
}

pub fn stalled_pattern(c: &Candles, i: usize) -> i32 {
    let hit = c.white(i - 2)
        && c.white(i - 1)
        && c.white(i)
        && c.close(i) > c.close(i - 1)
        && c.close(i - 1) > c.close(i - 2)
        && c.real_body(i - 2) > c.avg(S::BodyLong, i - 2)
        && c.real_body(i - 1) > c.avg(S::BodyLong, i - 1)
        && c.upper_shadow(i - 1) < c.avg(S::ShadowVeryShort, i - 1)
        && c.open(i - 1) > c.open(i - 2)
        && c.open(i - 1) <= c.close(i - 2) + c.avg(S::Near, i - 2)
        && c.real_body(i) < c.avg(S::BodyShort, i)
        && c.open(i) >= c.close(i - 1) - c.real_body(i) - c.avg(S::Near, i - 1);
    signal(hit, -100)
}

pub fn stick_sandwich(c: &Candles, i: usize) -> i32 {
    let eq = c.avg(S::Equal, i - 2);
    let hit = c.black(i - 2)
        && c.white(i - 1)
        && c.black(i)
        && c.low(i - 1) > c.close(i - 2)
        && c.close(i) <= c.close(i - 2) + eq
        && c.close(i) >= c.close(i - 2) - eq;
    signal(hit, 100)
}

pub fn tasuki_gap(c: &Candles, i: usize) -> i32 {
    let similar_bodies = (c.real_body(i - 1) - c.real_body(i)).abs() < c.avg(S::Near, i - 1);
    let up = c.real_body_gap_up(i - 1, i - 2)
        && c.white(i - 1)
        && c.black(i)
        && c.open(i) < c.close(i - 1)
        && c.open(i) > c.open(i - 1)
        && c.close(i) < c.open(i - 1)
        && c.close(i) > c.body_top(i - 2)
        && similar_bodies;
    let down = c.real_body_gap_down(i - 1, i - 2)
        && c.black(i - 1)
        && c.white(i)
        && c.open(i) < c.open(i - 1)
        && c.open(i) > c.close(i - 1)
        && c.close(i) > c.open(i - 1)
        && c.close(i) < c.body_bottom(i - 2)
        && similar_bodies;
    signal(up || down, c.color(i - 1) * 100)
}

/// Three dojis where the middle one gaps away. All three bodies are measured
/// against the doji threshold seen from the first.
pub fn tristar(c: &Candles, i: usize) -> i32 {
    let doji = c.avg(S::BodyDoji, i - 2);
    if !(c.real_body(i - 2) <= doji && c.real_body(i - 1) <= doji && c.real_body(i) <= doji) {
        return 0;
    }
    let mut out = 0;
    if c.real_body_gap_up(i - 1, i - 2) && c.body_top(i) < c.body_top(i - 1) {
        out = -100;
    }
    if c.real_body_gap_down(i - 1, i - 2) && c.body_bottom(i) > c.body_bottom(i - 1) {
        out = 100;
    }
    out
}

pub fn unique_three_river(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i - 2) > c.avg(S::BodyLong, i - 2)
        && c.black(i - 2)
        && c.black(i - 1)
        && c.close(i - 1) > c.close(i - 2)
        && c.open(i - 1) <= c.open(i - 2)
        && c.low(i - 1) < c.low(i - 2)
        && c.real_body(i) < c.avg(S::BodyShort, i)
        && c.white(i)
        && c.open(i) > c.low(i - 1);
    signal(hit, 100)
}

pub fn upside_gap_two_crows(c: &Candles, i: usize) -> i32 {
    let hit = c.white(i - 2)
        && c.real_body(i - 2) > c.avg(S::BodyLong, i - 2)
        && c.black(i - 1)
        && c.real_body(i - 1) <= c.avg(S::BodyShort, i - 1)
        && c.real_body_gap_up(i - 1, i - 2)
        && c.black(i)
        && c.open(i) > c.open(i - 1)
        && c.close(i) < c.close(i - 1)
        && c.close(i) > c.close(i - 2);
    signal(hit, -100)
}

pub fn x_side_gap_three_methods(c: &Candles, i: usize) -> i32 {
    let hit = c.color(i - 2) == c.color(i - 1)
        && c.color(i - 1) == -c.color(i)
        && c.open(i) < c.body_top(i - 1)
        && c.open(i) > c.body_bottom(i - 1)
        && c.close(i) < c.body_top(i - 2)
        && c.close(i) > c.body_bottom(i - 2)
        && ((c.white(i - 2) && c.real_body_gap_up(i - 1, i - 2))
            || (c.black(i - 2) && c.real_body_gap_down(i - 1, i - 2)));
    signal(hit, c.color(i - 2) * 100)
}

#[cfg(test)]
mod tests {
    use super::super::candle::fixtures::with_tail;
    use super::*;

    fn last(tail: &[(f64, f64, f64, f64)], f: fn(&Candles, usize) -> i32) -> i32 {
        let bars = with_tail(12, tail);
        let c = Candles::new(&bars);
        f(&c, bars.len() - 1)
    }

    #[test]
    fn morning_and_evening_star() {
        let morning = [
            (104.0, 104.2, 100.9, 101.0),
            (100.2, 100.5, 99.6, 100.0),
            (100.5, 103.6, 100.4, 103.5),
        ];
        assert_eq!(last(&morning, morning_star), 100);
        assert_eq!(last(&morning, evening_star), 0);

        let evening = [
            (101.0, 104.1, 100.9, 104.0),
            (104.3, 104.7, 104.2, 104.5),
            (104.0, 104.1, 101.3, 101.5),
        ];
        assert_eq!(last(&evening, evening_star), -100);
    }

    #[test]
    fn doji_star_variants() {
        let morning = [
            (104.0, 104.2, 100.9, 101.0),
            (100.2, 100.5, 99.8, 100.22),
            (100.5, 103.6, 100.4, 103.5),
        ];
        assert_eq!(last(&morning, morning_doji_star), 100);
        assert_eq!(last(&morning, morning_star), 100);
    }

    #[test]
    fn three_white_soldiers_steps_up() {
        let tail = [
            (101.0, 102.05, 100.9, 102.0),
            (101.8, 103.05, 101.7, 103.0),
            (102.8, 104.05, 102.7, 104.0),
        ];
        assert_eq!(last(&tail, three_white_soldiers), 100);
    }

    #[test]
    fn three_outside_up() {
        let tail = [
            (102.0, 102.2, 100.4, 100.5),
            (100.3, 102.6, 100.2, 102.5),
            (102.5, 103.2, 102.4, 103.0),
        ];
        assert_eq!(last(&tail, three_outside), 100);
    }

    #[test]
    fn hikkake_setup_then_confirmation() {
        // Mother bar, inside bar, false breakdown.
        let setup = [
            (100.0, 103.0, 98.0, 101.0),
            (100.5, 102.0, 99.0, 101.0),
            (100.0, 101.5, 98.5, 99.0),
        ];
        assert_eq!(last(&setup, hikkake), 100);

        // Close above the inside bar's high within three bars confirms.
        let mut confirmed = setup.to_vec();
        confirmed.push((99.5, 102.6, 99.4, 102.5));
        assert_eq!(last(&confirmed, hikkake), 200);

        // Confirmation is only reported once.
        confirmed.push((102.5, 103.0, 102.0, 102.8));
        assert_eq!(last(&confirmed, hikkake), 0);
    }

    #[test]
    fn tristar_top() {
        let tail = [
            (101.0, 101.5, 100.5, 101.02),
            (102.0, 102.5, 101.5, 102.02),
            (101.5, 102.0, 101.0, 101.51),
        ];
        assert_eq!(last(&tail, tristar), -100);
    }

    #[test]
    fn stick_sandwich_matching_closes() {
        let tail = [
            (102.0, 102.1, 99.9, 100.0),
            (100.5, 102.1, 100.4, 102.0),
            (102.5, 102.6, 99.95, 100.02),
        ];
        assert_eq!(last(&tail, stick_sandwich), 100);
    }

    #[test]
    fn two_crows_after_gap() {
        let tail = [
            (100.0, 103.1, 99.9, 103.0),
            (104.5, 104.6, 103.9, 104.0),
            (104.2, 104.3, 101.4, 101.5),
        ];
        assert_eq!(last(&tail, two_crows), -100);
        assert_eq!(last(&tail, upside_gap_two_crows), 0);
    }
}

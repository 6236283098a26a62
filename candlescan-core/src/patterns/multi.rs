//! Recognizers spanning four or five candles.

use super::candle::{signal, Candles, Setting as S};
use super::triple::replay_breakout;

const MAT_HOLD_PENETRATION: f64 = 0.5;

pub fn three_line_strike(c: &Candles, i: usize) -> i32 {
    let near3 = c.avg(S::Near, i - 3);
    let near2 = c.avg(S::Near, i - 2);
    let setup = c.color(i - 3) == c.color(i - 2)
        && c.color(i - 2) == c.color(i - 1)
        && c.color(i) == -c.color(i - 1)
        && c.open(i - 2) >= c.body_bottom(i - 3) - near3
        && c.open(i - 2) <= c.body_top(i - 3) + near3
        && c.open(i - 1) >= c.body_bottom(i - 2) - near2
        && c.open(i - 1) <= c.body_top(i - 2) + near2;
    let white_run = c.white(i - 1)
        && c.close(i - 1) > c.close(i - 2)
        && c.close(i - 2) > c.close(i - 3)
        && c.open(i) > c.close(i - 1)
        && c.close(i) < c.open(i - 3);
    let black_run = c.black(i - 1)
        && c.close(i - 1) < c.close(i - 2)
        && c.close(i - 2) < c.close(i - 3)
        && c.open(i) < c.close(i - 1)
        && c.close(i) > c.open(i - 3);
    signal(setup && (white_run || black_run), c.color(i - 1) * 100)
}

pub fn breakaway(c: &Candles, i: usize) -> i32 {
    let setup = c.real_body(i - 4) > c.avg(S::BodyLong, i - 4)
        && c.color(i - 4) == c.color(i - 3)
        && c.color(i - 3) == c.color(i - 1)
        && c.color(i - 1) == -c.color(i);
    let bullish = c.black(i - 4)
        && c.real_body_gap_down(i - 3, i - 4)
        && c.high(i - 2) < c.high(i - 3)
        && c.low(i - 2) < c.low(i - 3)
        && c.high(i - 1) < c.high(i - 2)
        && c.low(i - 1) < c.low(i - 2)
        && c.close(i) > c.open(i - 3)
        && c.close(i) < c.close(i - 4);
    let bearish = c.white(i - 4)
        && c.real_body_gap_up(i - 3, i - 4)
        && c.high(i - 2) > c.high(i - 3)
        && c.low(i - 2) > c.low(i - 3)
        && c.high(i - 1) > c.high(i - 2)
        && c.low(i - 1) > c.low(i - 2)
        && c.close(i) < c.open(i - 3)
        && c.close(i) > c.close(i - 4);
    signal(setup && (bullish || bearish), c.color(i) * 100)
}

pub fn conceal_baby_swallow(c: &Candles, i: usize) -> i32 {
    let marubozu = |j: usize| {
        c.lower_shadow(j) < c.avg(S::ShadowVeryShort, j) && c.upper_shadow(j) < c.avg(S::ShadowVeryShort, j)
    };
    let hit = c.black(i - 3)
        && c.black(i - 2)
        && c.black(i - 1)
        && c.black(i)
        && marubozu(i - 3)
        && marubozu(i - 2)
        && c.real_body_gap_down(i - 1, i - 2)
        && c.upper_shadow(i - 1) > c.avg(S::ShadowVeryShort, i - 1)
        && c.high(i - 1) > c.close(i - 2)
        && c.high(i) > c.high(i - 1)
        && c.low(i) < c.low(i - 1);
    signal(hit, 100)
}

/// Hikkake preceded by a second inside bar, with the first inside bar
/// closing near the end of its range in the breakout direction.
pub fn hikkake_modified(c: &Candles, i: usize) -> i32 {
    let setup = |j: usize| {
        let near = c.avg(S::Near, j - 2);
        c.high(j - 2) < c.high(j - 3)
            && c.low(j - 2) > c.low(j - 3)
            && c.high(j - 1) < c.high(j - 2)
            && c.low(j - 1) > c.low(j - 2)
            && ((c.high(j) < c.high(j - 1) && c.low(j) < c.low(j - 1) && c.close(j - 2) <= c.low(j - 2) + near)
                || (c.high(j) > c.high(j - 1) && c.low(j) > c.low(j - 1) && c.close(j - 2) >= c.high(j - 2) - near))
    };
    replay_breakout(c, i, 3, setup)
}

pub fn ladder_bottom(c: &Candles, i: usize) -> i32 {
    let hit = c.black(i - 4)
        && c.black(i - 3)
        && c.black(i - 2)
        && c.open(i - 4) > c.open(i - 3)
        && c.open(i - 3) > c.open(i - 2)
        && c.close(i - 4) > c.close(i - 3)
        && c.close(i - 3) > c.close(i - 2)
        && c.black(i - 1)
        && c.upper_shadow(i - 1) > c.avg(S::ShadowVeryShort, i - 1)
        && c.white(i)
        && c.open(i) > c.open(i - 1)
        && c.close(i) > c.high(i - 1);
    signal(hit, 100)
}

pub fn mat_hold(c: &Candles, i: usize) -> i32 {
    let floor = c.close(i - 4) - c.real_body(i - 4) * MAT_HOLD_PENETRATION;
    let hit = c.real_body(i - 4) > c.avg(S::BodyLong, i - 4)
        && c.real_body(i - 3) < c.avg(S::BodyShort, i - 3)
        && c.real_body(i - 2) < c.avg(S::BodyShort, i - 2)
        && c.real_body(i - 1) < c.avg(S::BodyShort, i - 1)
        && c.white(i - 4)
        && c.black(i - 3)
        && c.white(i)
        && c.real_body_gap_up(i - 3, i - 4)
        && c.body_bottom(i - 2) < c.close(i - 4)
        && c.body_bottom(i - 1) < c.close(i - 4)
        && c.body_bottom(i - 2) > floor
        && c.body_bottom(i - 1) > floor
        && c.body_top(i - 2) < c.open(i - 3)
        && c.body_top(i - 1) < c.body_top(i - 2)
        && c.open(i) > c.close(i - 1)
        && c.close(i) > c.high(i - 3).max(c.high(i - 2)).max(c.high(i - 1));
    signal(hit, 100)
}

pub fn rise_fall_three_methods(c: &Candles, i: usize) -> i32 {
    let dir = f64::from(c.color(i - 4));
    let within_first = |j: usize| c.body_bottom(j) < c.high(i - 4) && c.body_top(j) > c.low(i - 4);
    let hit = c.real_body(i - 4) > c.avg(S::BodyLong, i - 4)
        && c.real_body(i - 3) < c.avg(S::BodyShort, i - 3)
        && c.real_body(i - 2) < c.avg(S::BodyShort, i - 2)
        && c.real_body(i - 1) < c.avg(S::BodyShort, i - 1)
        && c.real_body(i) > c.avg(S::BodyLong, i)
        && c.color(i - 4) == -c.color(i - 3)
        && c.color(i - 3) == c.color(i - 2)
        && c.color(i - 2) == c.color(i - 1)
        && c.color(i - 1) == -c.color(i)
        && within_first(i - 3)
        && within_first(i - 2)
        && within_first(i - 1)
        && c.close(i - 2) * dir < c.close(i - 3) * dir
        && c.close(i - 1) * dir < c.close(i - 2) * dir
        && c.open(i) * dir > c.close(i - 1) * dir
        && c.close(i) * dir > c.close(i - 4) * dir;
    signal(hit, c.color(i - 4) * 100)
}

//! Two-candle recognizers. The final bar is `i`, the setup bar is `i - 1`.

use super::candle::{signal, Candles, Setting as S};

const DARK_CLOUD_PENETRATION: f64 = 0.5;

pub fn counterattack(c: &Candles, i: usize) -> i32 {
    let eq = c.avg(S::Equal, i - 1);
    let hit = c.color(i - 1) == -c.color(i)
        && c.real_body(i - 1) > c.avg(S::BodyLong, i - 1)
        && c.real_body(i) > c.avg(S::BodyLong, i)
        && c.close(i) <= c.close(i - 1) + eq
        && c.close(i) >= c.close(i - 1) - eq;
    signal(hit, c.color(i) * 100)
}

pub fn dark_cloud_cover(c: &Candles, i: usize) -> i32 {
    let hit = c.white(i - 1)
        && c.real_body(i - 1) > c.avg(S::BodyLong, i - 1)
        && c.black(i)
        && c.open(i) > c.high(i - 1)
        && c.close(i) > c.open(i - 1)
        && c.close(i) < c.close(i - 1) - c.real_body(i - 1) * DARK_CLOUD_PENETRATION;
    signal(hit, -100)
}

pub fn doji_star(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i - 1) > c.avg(S::BodyLong, i - 1)
        && c.real_body(i) <= c.avg(S::BodyDoji, i)
        && ((c.white(i - 1) && c.real_body_gap_up(i, i - 1))
            || (c.black(i - 1) && c.real_body_gap_down(i, i - 1)));
    signal(hit, -c.color(i - 1) * 100)
}

/// Final real body engulfs the prior, opposite-colored one.
pub fn engulfing(c: &Candles, i: usize) -> i32 {
    let bullish = c.white(i) && c.black(i - 1) && c.close(i) > c.open(i - 1) && c.open(i) < c.close(i - 1);
    let bearish = c.black(i) && c.white(i - 1) && c.open(i) > c.close(i - 1) && c.close(i) < c.open(i - 1);
    signal(bullish || bearish, c.color(i) * 100)
}

fn inside_prior_body(c: &Candles, i: usize) -> bool {
    c.body_top(i) < c.body_top(i - 1) && c.body_bottom(i) > c.body_bottom(i - 1)
}

pub fn harami(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i - 1) > c.avg(S::BodyLong, i - 1)
        && c.real_body(i) <= c.avg(S::BodyShort, i)
        && inside_prior_body(c, i);
    signal(hit, -c.color(i - 1) * 100)
}

pub fn harami_cross(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i - 1) > c.avg(S::BodyLong, i - 1)
        && c.real_body(i) <= c.avg(S::BodyDoji, i)
        && inside_prior_body(c, i);
    signal(hit, -c.color(i - 1) * 100)
}

pub fn homing_pigeon(c: &Candles, i: usize) -> i32 {
    let hit = c.black(i - 1)
        && c.black(i)
        && c.real_body(i - 1) > c.avg(S::BodyLong, i - 1)
        && c.real_body(i) <= c.avg(S::BodyShort, i)
        && c.open(i) < c.open(i - 1)
        && c.close(i) > c.close(i - 1);
    signal(hit, 100)
}

fn long_black_then_white_below_low(c: &Candles, i: usize) -> bool {
    c.black(i - 1) && c.real_body(i - 1) > c.avg(S::BodyLong, i - 1) && c.white(i) && c.open(i) < c.low(i - 1)
}

pub fn in_neck(c: &Candles, i: usize) -> i32 {
    let hit = long_black_then_white_below_low(c, i)
        && c.close(i) <= c.close(i - 1) + c.avg(S::Equal, i - 1)
        && c.close(i) >= c.close(i - 1);
    signal(hit, -100)
}

pub fn on_neck(c: &Candles, i: usize) -> i32 {
    let eq = c.avg(S::Equal, i - 1);
    let hit = long_black_then_white_below_low(c, i)
        && c.close(i) <= c.low(i - 1) + eq
        && c.close(i) >= c.low(i - 1) - eq;
    signal(hit, -100)
}

pub fn thrusting(c: &Candles, i: usize) -> i32 {
    let hit = long_black_then_white_below_low(c, i)
        && c.close(i) > c.close(i - 1) + c.avg(S::Equal, i - 1)
        && c.close(i) <= c.close(i - 1) + c.real_body(i - 1) * 0.5;
    signal(hit, -100)
}

fn kicking_setup(c: &Candles, i: usize) -> bool {
    let marubozu = |j: usize| {
        c.real_body(j) > c.avg(S::BodyLong, j)
            && c.upper_shadow(j) < c.avg(S::ShadowVeryShort, j)
            && c.lower_shadow(j) < c.avg(S::ShadowVeryShort, j)
    };
    c.color(i - 1) == -c.color(i)
        && marubozu(i - 1)
        && marubozu(i)
        && ((c.black(i - 1) && c.candle_gap_up(i, i - 1)) || (c.white(i - 1) && c.candle_gap_down(i, i - 1)))
}

pub fn kicking(c: &Candles, i: usize) -> i32 {
    signal(kicking_setup(c, i), c.color(i) * 100)
}

/// Kicking, signed by whichever marubozu is longer.
pub fn kicking_by_length(c: &Candles, i: usize) -> i32 {
    let longer = if c.real_body(i) > c.real_body(i - 1) { i } else { i - 1 };
    signal(kicking_setup(c, i), c.color(longer) * 100)
}

pub fn matching_low(c: &Candles, i: usize) -> i32 {
    let eq = c.avg(S::Equal, i - 1);
    let hit = c.black(i - 1) && c.black(i) && c.close(i) <= c.close(i - 1) + eq && c.close(i) >= c.close(i - 1) - eq;
    signal(hit, 100)
}

pub fn piercing(c: &Candles, i: usize) -> i32 {
    let hit = c.black(i - 1)
        && c.real_body(i - 1) > c.avg(S::BodyLong, i - 1)
        && c.white(i)
        && c.real_body(i) > c.avg(S::BodyLong, i)
        && c.open(i) < c.low(i - 1)
        && c.close(i) < c.open(i - 1)
        && c.close(i) > c.close(i - 1) + c.real_body(i - 1) * 0.5;
    signal(hit, 100)
}

pub fn separating_lines(c: &Candles, i: usize) -> i32 {
    let eq = c.avg(S::Equal, i - 1);
    let hit = c.color(i - 1) == -c.color(i)
        && c.open(i) <= c.open(i - 1) + eq
        && c.open(i) >= c.open(i - 1) - eq
        && c.real_body(i) > c.avg(S::BodyLong, i)
        && ((c.white(i) && c.lower_shadow(i) < c.avg(S::ShadowVeryShort, i))
            || (c.black(i) && c.upper_shadow(i) < c.avg(S::ShadowVeryShort, i)));
    signal(hit, c.color(i) * 100)
}

//! Recognizers decided by the shape of the final candle (some also glance at
//! the bar before it for location).

use super::candle::{signal, Candles, Setting as S};

pub fn belt_hold(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) > c.avg(S::BodyLong, i)
        && ((c.white(i) && c.lower_shadow(i) < c.avg(S::ShadowVeryShort, i))
            || (c.black(i) && c.upper_shadow(i) < c.avg(S::ShadowVeryShort, i)));
    signal(hit, c.color(i) * 100)
}

pub fn closing_marubozu(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) > c.avg(S::BodyLong, i)
        && ((c.white(i) && c.upper_shadow(i) < c.avg(S::ShadowVeryShort, i))
            || (c.black(i) && c.lower_shadow(i) < c.avg(S::ShadowVeryShort, i)));
    signal(hit, c.color(i) * 100)
}

pub fn doji(c: &Candles, i: usize) -> i32 {
    signal(c.real_body(i) <= c.avg(S::BodyDoji, i), 100)
}

pub fn dragonfly_doji(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) <= c.avg(S::BodyDoji, i)
        && c.upper_shadow(i) < c.avg(S::ShadowVeryShort, i)
        && c.lower_shadow(i) > c.avg(S::ShadowVeryShort, i);
    signal(hit, 100)
}

pub fn gravestone_doji(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) <= c.avg(S::BodyDoji, i)
        && c.lower_shadow(i) < c.avg(S::ShadowVeryShort, i)
        && c.upper_shadow(i) > c.avg(S::ShadowVeryShort, i);
    signal(hit, 100)
}

fn hammer_shape(c: &Candles, i: usize) -> bool {
    c.real_body(i) < c.avg(S::BodyShort, i)
        && c.lower_shadow(i) > c.avg(S::ShadowLong, i)
        && c.upper_shadow(i) < c.avg(S::ShadowVeryShort, i)
}

/// Small body near the prior bar's low with a long lower shadow.
pub fn hammer(c: &Candles, i: usize) -> i32 {
    let hit = hammer_shape(c, i) && c.body_bottom(i) <= c.low(i - 1) + c.avg(S::Near, i - 1);
    signal(hit, 100)
}

/// Hammer shape printed near the prior bar's high.
pub fn hanging_man(c: &Candles, i: usize) -> i32 {
    let hit = hammer_shape(c, i) && c.body_bottom(i) >= c.high(i - 1) - c.avg(S::Near, i - 1);
    signal(hit, -100)
}

pub fn high_wave(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) < c.avg(S::BodyShort, i)
        && c.upper_shadow(i) > c.avg(S::ShadowVeryLong, i)
        && c.lower_shadow(i) > c.avg(S::ShadowVeryLong, i);
    signal(hit, c.color(i) * 100)
}

fn inverted_shape(c: &Candles, i: usize) -> bool {
    c.real_body(i) < c.avg(S::BodyShort, i)
        && c.upper_shadow(i) > c.avg(S::ShadowLong, i)
        && c.lower_shadow(i) < c.avg(S::ShadowVeryShort, i)
}

pub fn inverted_hammer(c: &Candles, i: usize) -> i32 {
    signal(inverted_shape(c, i) && c.real_body_gap_down(i, i - 1), 100)
}

pub fn shooting_star(c: &Candles, i: usize) -> i32 {
    signal(inverted_shape(c, i) && c.real_body_gap_up(i, i - 1), -100)
}

pub fn long_legged_doji(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) <= c.avg(S::BodyDoji, i)
        && (c.lower_shadow(i) > c.avg(S::ShadowLong, i) || c.upper_shadow(i) > c.avg(S::ShadowLong, i));
    signal(hit, 100)
}

pub fn long_line(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) > c.avg(S::BodyLong, i)
        && c.upper_shadow(i) < c.avg(S::ShadowShort, i)
        && c.lower_shadow(i) < c.avg(S::ShadowShort, i);
    signal(hit, c.color(i) * 100)
}

pub fn marubozu(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) > c.avg(S::BodyLong, i)
        && c.upper_shadow(i) < c.avg(S::ShadowVeryShort, i)
        && c.lower_shadow(i) < c.avg(S::ShadowVeryShort, i);
    signal(hit, c.color(i) * 100)
}

/// Long-legged doji whose body sits near the middle of the range.
pub fn rickshaw_man(c: &Candles, i: usize) -> i32 {
    let mid = c.low(i) + c.high_low_range(i) / 2.0;
    let near = c.avg(S::Near, i);
    let hit = c.real_body(i) <= c.avg(S::BodyDoji, i)
        && c.lower_shadow(i) > c.avg(S::ShadowLong, i)
        && c.upper_shadow(i) > c.avg(S::ShadowLong, i)
        && c.body_bottom(i) <= mid + near
        && c.body_top(i) >= mid - near;
    signal(hit, 100)
}

pub fn short_line(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) < c.avg(S::BodyShort, i)
        && c.upper_shadow(i) < c.avg(S::ShadowShort, i)
        && c.lower_shadow(i) < c.avg(S::ShadowShort, i);
    signal(hit, c.color(i) * 100)
}

pub fn spinning_top(c: &Candles, i: usize) -> i32 {
    let body = c.real_body(i);
    let hit = body < c.avg(S::BodyShort, i) && c.upper_shadow(i) > body && c.lower_shadow(i) > body;
    signal(hit, c.color(i) * 100)
}

pub fn takuri(c: &Candles, i: usize) -> i32 {
    let hit = c.real_body(i) <= c.avg(S::BodyDoji, i)
        && c.upper_shadow(i) < c.avg(S::ShadowVeryShort, i)
        && c.lower_shadow(i) > c.avg(S::ShadowVeryLong, i);
    signal(hit, 100)
}

//! The fixed recognizer table.
//!
//! Adding or removing a pattern is a one-row change here; the engine iterates
//! this table and never branches on individual patterns.

use super::candle::Candles;
use super::{double, multi, single, triple};
use serde::{Serialize, Serializer};
use std::fmt;

/// Stable pattern identifier, e.g. `CDLENGULFING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternId(pub &'static str);

impl PatternId {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for PatternId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

pub type DetectFn = fn(&Candles, usize) -> i32;

/// One candlestick recognizer.
#[derive(Clone, Copy)]
pub struct Recognizer {
    pub id: PatternId,
    pub name: &'static str,
    /// Bars required before the evaluated bar.
    pub lookback: usize,
    pub detect: DetectFn,
}

impl fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recognizer")
            .field("id", &self.id)
            .field("lookback", &self.lookback)
            .finish()
    }
}

const fn r(id: &'static str, name: &'static str, lookback: usize, detect: DetectFn) -> Recognizer {
    Recognizer {
        id: PatternId(id),
        name,
        lookback,
        detect,
    }
}

pub static RECOGNIZERS: [Recognizer; 61] = [
    r("CDL2CROWS", "Two Crows", 12, triple::two_crows),
    r("CDL3BLACKCROWS", "Three Black Crows", 13, triple::three_black_crows),
    r("CDL3INSIDE", "Three Inside Up/Down", 12, triple::three_inside),
    r("CDL3LINESTRIKE", "Three-Line Strike", 8, multi::three_line_strike),
    r("CDL3OUTSIDE", "Three Outside Up/Down", 3, triple::three_outside),
    r("CDL3STARSINSOUTH", "Three Stars In The South", 12, triple::three_stars_in_south),
    r("CDL3WHITESOLDIERS", "Three Advancing White Soldiers", 12, triple::three_white_soldiers),
    r("CDLABANDONEDBABY", "Abandoned Baby", 12, triple::abandoned_baby),
    r("CDLADVANCEBLOCK", "Advance Block", 12, triple::advance_block),
    r("CDLBELTHOLD", "Belt-hold", 10, single::belt_hold),
    r("CDLBREAKAWAY", "Breakaway", 14, multi::breakaway),
    r("CDLCLOSINGMARUBOZU", "Closing Marubozu", 10, single::closing_marubozu),
    r("CDLCONCEALBABYSWALL", "Concealing Baby Swallow", 13, multi::conceal_baby_swallow),
    r("CDLCOUNTERATTACK", "Counterattack", 11, double::counterattack),
    r("CDLDARKCLOUDCOVER", "Dark Cloud Cover", 11, double::dark_cloud_cover),
    r("CDLDOJI", "Doji", 10, single::doji),
    r("CDLDOJISTAR", "Doji Star", 11, double::doji_star),
    r("CDLDRAGONFLYDOJI", "Dragonfly Doji", 10, single::dragonfly_doji),
    r("CDLENGULFING", "Engulfing Pattern", 2, double::engulfing),
    r("CDLEVENINGDOJISTAR", "Evening Doji Star", 12, triple::evening_doji_star),
    r("CDLEVENINGSTAR", "Evening Star", 12, triple::evening_star),
    r("CDLGAPSIDESIDEWHITE", "Up/Down-gap side-by-side white lines", 7, triple::gap_side_side_white),
    r("CDLGRAVESTONEDOJI", "Gravestone Doji", 10, single::gravestone_doji),
    r("CDLHAMMER", "Hammer", 11, single::hammer),
    r("CDLHANGINGMAN", "Hanging Man", 11, single::hanging_man),
    r("CDLHARAMI", "Harami Pattern", 11, double::harami),
    r("CDLHARAMICROSS", "Harami Cross Pattern", 11, double::harami_cross),
    r("CDLHIGHWAVE", "High-Wave Candle", 10, single::high_wave),
    r("CDLHIKKAKE", "Hikkake Pattern", 5, triple::hikkake),
    r("CDLHIKKAKEMOD", "Modified Hikkake Pattern", 10, multi::hikkake_modified),
    r("CDLHOMINGPIGEON", "Homing Pigeon", 11, double::homing_pigeon),
    r("CDLIDENTICAL3CROWS", "Identical Three Crows", 12, triple::identical_three_crows),
    r("CDLINNECK", "In-Neck Pattern", 11, double::in_neck),
    r("CDLINVERTEDHAMMER", "Inverted Hammer", 11, single::inverted_hammer),
    r("CDLKICKING", "Kicking", 11, double::kicking),
    r("CDLKICKINGBYLENGTH", "Kicking - bull/bear determined by the longer marubozu", 11, double::kicking_by_length),
    r("CDLLADDERBOTTOM", "Ladder Bottom", 14, multi::ladder_bottom),
    r("CDLLONGLEGGEDDOJI", "Long Legged Doji", 10, single::long_legged_doji),
    r("CDLLONGLINE", "Long Line Candle", 10, single::long_line),
    r("CDLMARUBOZU", "Marubozu", 10, single::marubozu),
    r("CDLMATCHINGLOW", "Matching Low", 6, double::matching_low),
    r("CDLMATHOLD", "Mat Hold", 14, multi::mat_hold),
    r("CDLMORNINGDOJISTAR", "Morning Doji Star", 12, triple::morning_doji_star),
    r("CDLMORNINGSTAR", "Morning Star", 12, triple::morning_star),
    r("CDLONNECK", "On-Neck Pattern", 11, double::on_neck),
    r("CDLPIERCING", "Piercing Pattern", 11, double::piercing),
    r("CDLRICKSHAWMAN", "Rickshaw Man", 10, single::rickshaw_man),
    r("CDLRISEFALL3METHODS", "Rising/Falling Three Methods", 14, multi::rise_fall_three_methods),
    r("CDLSEPARATINGLINES", "Separating Lines", 11, double::separating_lines),
    r("CDLSHOOTINGSTAR", "Shooting Star", 11, single::shooting_star),
    r("CDLSHORTLINE", "Short Line Candle", 10, single::short_line),
    r("CDLSPINNINGTOP", "Spinning Top", 10, single::spinning_top),
    r("CDLSTALLEDPATTERN", "Stalled Pattern", 12, triple::stalled_pattern),
    r("CDLSTICKSANDWICH", "Stick Sandwich", 7, triple::stick_sandwich),
    r("CDLTAKURI", "Takuri (Dragonfly Doji with very long lower shadow)", 10, single::takuri),
    r("CDLTASUKIGAP", "Tasuki Gap", 7, triple::tasuki_gap),
    r("CDLTHRUSTING", "Thrusting Pattern", 11, double::thrusting),
    r("CDLTRISTAR", "Tristar Pattern", 12, triple::tristar),
    r("CDLUNIQUE3RIVER", "Unique 3 River", 12, triple::unique_three_river),
    r("CDLUPSIDEGAP2CROWS", "Upside Gap Two Crows", 12, triple::upside_gap_two_crows),
    r("CDLXSIDEGAP3METHODS", "Upside/Downside Gap Three Methods", 2, triple::x_side_gap_three_methods),
];

/// Look up a recognizer by identifier. Case-insensitive; the `CDL` prefix
/// is optional.
pub fn find(name: &str) -> Option<&'static Recognizer> {
    let upper = name.trim().to_ascii_uppercase();
    let wanted = if upper.starts_with("CDL") {
        upper
    } else {
        format!("CDL{upper}")
    };
    RECOGNIZERS.iter().find(|rec| rec.id.0 == wanted)
}

/// Largest lookback in the table.
pub fn max_lookback() -> usize {
    RECOGNIZERS.iter().map(|rec| rec.lookback).max().unwrap_or(0)
}

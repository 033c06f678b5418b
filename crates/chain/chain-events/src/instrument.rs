#![forbid(unsafe_code)]

use std::fmt;

/// Fixed-point scale of a [`Strike`]: one unit is 1/100 of a price point.
pub const STRIKE_SCALE: i64 = 100;

// Strike is stored as integer hundredths so it can be used as an ordered map key
// without float equality hazards. 5012.5 -> Strike(501_250)
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Strike(pub i64);

impl Strike {
    /// Rounds a wire price to the nearest hundredth.
    #[inline]
    pub fn from_f64(px: f64) -> Self {
        Strike((px * STRIKE_SCALE as f64).round() as i64)
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / STRIKE_SCALE as f64
    }

    /// Whole price points, rounded toward negative infinity.
    #[inline]
    pub fn whole(self) -> i64 {
        self.0.div_euclid(STRIKE_SCALE)
    }

    /// Fractional part in hundredths, always in `0..STRIKE_SCALE`.
    #[inline]
    pub fn frac_hundredths(self) -> i64 {
        self.0.rem_euclid(STRIKE_SCALE)
    }
}

impl fmt::Display for Strike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.whole(), self.frac_hundredths())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Call,
    Put,
}

impl Side {
    /// Single letter "right" code used by the gateway protocol.
    pub fn code(self) -> &'static str {
        match self {
            Side::Call => "C",
            Side::Put => "P",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "C" | "CALL" => Some(Side::Call),
            "P" | "PUT" => Some(Side::Put),
            _ => None,
        }
    }
}

/// One tradable option: a strike and a side.
///
/// Ordering is strike first, then side (`Call < Put`), which is the order
/// wire ids are handed out in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrumentKey {
    pub strike: Strike,
    pub side: Side,
}

impl InstrumentKey {
    pub fn new(strike: Strike, side: Side) -> Self {
        Self { strike, side }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.strike, self.side.code())
    }
}

// WireId is the compact id the gateway tags market data with.
// 0 is reserved for the underlying future, options start at 1.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WireId(pub u32);

impl WireId {
    pub const UNDERLYING: WireId = WireId(0);

    #[inline]
    pub fn is_underlying(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Price fields tracked per instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TickField {
    Bid,
    Ask,
    Last,
}

impl TickField {
    /// Maps a gateway tick type (live or delayed) to a tracked field.
    /// Sizes, greeks and every other tick type map to `None`.
    pub fn from_tick_type(tick_type: i32) -> Option<Self> {
        match tick_type {
            1 | 66 => Some(TickField::Bid),
            2 | 67 => Some(TickField::Ask),
            4 | 68 => Some(TickField::Last),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TickField::Bid => "bid",
            TickField::Ask => "ask",
            TickField::Last => "last",
        }
    }
}

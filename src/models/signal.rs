//! Trading direction types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional recommendation from a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Long,
    Short,
    #[default]
    None,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Long => "LONG",
            Signal::Short => "SHORT",
            Signal::None => "NONE",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Signal::None)
    }

    /// Return `other` when this signal is `None`.
    pub fn or(self, other: Signal) -> Signal {
        if self.is_none() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of an order or an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }

    /// Exchange order side that opens or adds to this direction.
    pub fn order_side(&self) -> &'static str {
        match self {
            Side::Long => "BUY",
            Side::Short => "SELL",
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Side> for Signal {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => Signal::Long,
            Side::Short => Signal::Short,
        }
    }
}

impl TryFrom<Signal> for Side {
    type Error = Signal;

    fn try_from(signal: Signal) -> Result<Self, Self::Error> {
        match signal {
            Signal::Long => Ok(Side::Long),
            Signal::Short => Ok(Side::Short),
            Signal::None => Err(signal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_to_side() {
        assert_eq!(Side::try_from(Signal::Long), Ok(Side::Long));
        assert_eq!(Side::try_from(Signal::Short), Ok(Side::Short));
        assert!(Side::try_from(Signal::None).is_err());
    }

    #[test]
    fn test_signal_or() {
        assert_eq!(Signal::None.or(Signal::Short), Signal::Short);
        assert_eq!(Signal::Long.or(Signal::Short), Signal::Long);
        assert_eq!(Signal::None.or(Signal::None), Signal::None);
    }
}

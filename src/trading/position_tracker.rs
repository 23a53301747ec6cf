//! Per-symbol risk memory: peak profit ratio and pyramid count.
//!
//! The tracker is a plain map. Concurrent evaluation works by moving each
//! symbol's entry out into a [`RiskSlot`], handing the slot to that symbol's
//! task, and putting it back once the task finishes.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

/// Risk memory for one open position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolRiskState {
    /// Running maximum of the profit ratio since the position was opened
    pub high_water_ratio: Decimal,

    /// Additional orders placed on top of the initial entry
    pub pyramid_count: u32,
}

impl SymbolRiskState {
    fn observe(&mut self, ratio: Decimal) {
        if ratio > self.high_water_ratio {
            self.high_water_ratio = ratio;
        }
    }

    fn add_pyramid(&mut self, max_pyramid: u32) {
        if self.pyramid_count < max_pyramid {
            self.pyramid_count += 1;
        }
    }
}

/// Keyed store of [`SymbolRiskState`], owned by the risk controller.
#[derive(Debug, Default)]
pub struct PositionTracker {
    max_pyramid: u32,
    states: HashMap<String, SymbolRiskState>,
}

impl PositionTracker {
    pub fn new(max_pyramid: u32) -> Self {
        Self {
            max_pyramid,
            states: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn get(&self, symbol: &str) -> Option<&SymbolRiskState> {
        self.states.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Move the state of each distinct symbol into its own slot.
    ///
    /// Symbols without state get an empty slot. Entries for symbols not named
    /// stay in the tracker.
    pub fn checkout(&mut self, symbols: &[String]) -> Vec<RiskSlot> {
        let mut seen = HashSet::new();
        symbols
            .iter()
            .filter(|s| seen.insert(s.as_str()))
            .map(|symbol| RiskSlot {
                symbol: symbol.clone(),
                state: self.states.remove(symbol),
                max_pyramid: self.max_pyramid,
            })
            .collect()
    }

    /// Put slots back. An empty slot removes whatever the tracker holds for
    /// that symbol.
    pub fn checkin(&mut self, slots: impl IntoIterator<Item = RiskSlot>) {
        for slot in slots {
            match slot.state {
                Some(state) => {
                    self.states.insert(slot.symbol, state);
                }
                None => {
                    self.states.remove(&slot.symbol);
                }
            }
        }
    }
}

/// One symbol's risk state, owned by the task evaluating that symbol.
#[derive(Debug, Clone)]
pub struct RiskSlot {
    symbol: String,
    state: Option<SymbolRiskState>,
    max_pyramid: u32,
}

impl RiskSlot {
    #[cfg(test)]
    pub fn new(symbol: impl Into<String>, max_pyramid: u32) -> Self {
        Self {
            symbol: symbol.into(),
            state: None,
            max_pyramid,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> Option<&SymbolRiskState> {
        self.state.as_ref()
    }

    pub fn get_or_init(&mut self) -> SymbolRiskState {
        *self.state.get_or_insert_with(SymbolRiskState::default)
    }

    pub fn update_high_water(&mut self, ratio: Decimal) {
        self.state.get_or_insert_with(SymbolRiskState::default).observe(ratio);
    }

    pub fn increment_pyramid(&mut self) {
        let max = self.max_pyramid;
        self.state.get_or_insert_with(SymbolRiskState::default).add_pyramid(max);
    }

    pub fn clear(&mut self) {
        self.state = None;
    }

    pub fn pyramid_count(&self) -> u32 {
        self.state.map(|s| s.pyramid_count).unwrap_or(0)
    }
}

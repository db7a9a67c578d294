//! Fans in L2 snapshots and trades per symbol, assembling the typed
//! `MarketData` bundle the rest of the core reads.

use std::collections::{HashMap, VecDeque};

use crate::book::{OrderBook, RawLevels};
use crate::types::{MarketData, OrderSide, Trade, MARKET_DATA_TRADE_TAIL, MAX_TRADE_HISTORY};

struct SymbolState {
    book: OrderBook,
    trades: VecDeque<Trade>,
}

/// Owns one `OrderBook` and one bounded trade ring per subscribed symbol.
/// This is the only component the feed adapter writes into; every other
/// component only reads `MarketData` snapshots produced here.
pub struct MarketDataManager {
    depth: usize,
    symbols: HashMap<String, SymbolState>,
}

impl MarketDataManager {
    pub fn new(symbols: &[String], depth: usize) -> Self {
        let mut map = HashMap::new();
        for symbol in symbols {
            map.insert(
                symbol.clone(),
                SymbolState {
                    book: OrderBook::new(symbol.clone(), depth),
                    trades: VecDeque::with_capacity(MAX_TRADE_HISTORY),
                },
            );
        }
        Self {
            depth,
            symbols: map,
        }
    }

    /// Registers a symbol not present at construction time.
    pub fn ensure_symbol(&mut self, symbol: &str) {
        self.symbols.entry(symbol.to_string()).or_insert_with(|| SymbolState {
            book: OrderBook::new(symbol, self.depth),
            trades: VecDeque::with_capacity(MAX_TRADE_HISTORY),
        });
    }

    pub fn on_l2_update(&mut self, symbol: &str, raw: &RawLevels, receive_time_ms: i64) {
        self.ensure_symbol(symbol);
        if let Some(state) = self.symbols.get_mut(symbol) {
            state.book.apply_snapshot(raw, receive_time_ms);
        }
    }

    /// Normalises a venue-specific side code and records the trade.
    pub fn on_trade(
        &mut self,
        symbol: &str,
        timestamp_ms: i64,
        price: rust_decimal::Decimal,
        size: rust_decimal::Decimal,
        side_code: &str,
    ) {
        let Some(side) = OrderSide::from_venue_code(side_code) else {
            return;
        };
        self.ensure_symbol(symbol);
        if let Some(state) = self.symbols.get_mut(symbol) {
            if state.trades.len() >= MAX_TRADE_HISTORY {
                state.trades.pop_front();
            }
            state.trades.push_back(Trade {
                timestamp_ms,
                price,
                size,
                side,
            });
        }
    }

    /// Returns `None` if the symbol is unknown or its book is not yet
    /// valid (missing a side). Otherwise a fresh `MarketData` bundling
    /// the book snapshot and the tail of recent trades.
    pub fn get_market_data(&self, symbol: &str) -> Option<MarketData> {
        let state = self.symbols.get(symbol)?;
        if !state.book.is_valid() {
            return None;
        }
        let snapshot = state.book.snapshot();
        let tail_start = state.trades.len().saturating_sub(MARKET_DATA_TRADE_TAIL);
        let trades: Vec<Trade> = state.trades.iter().skip(tail_start).copied().collect();
        Some(MarketData::from_book(&snapshot, trades))
    }

    pub fn known_symbols(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }
}

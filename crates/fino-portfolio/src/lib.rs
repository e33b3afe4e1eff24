#![deny(warnings)]

//! Portfolio accounting for Finomik: buy/sell orders against blended
//! average-cost positions, plus the market asset catalog gated by
//! investor level.
//!
//! Cost basis is a single weighted-average lot per symbol. Buys re-blend
//! the average cost, sells never touch it; realized gains are implicit and
//! never persisted. There is deliberately no FIFO/LIFO lot tracking.

use chrono::{DateTime, Utc};
use fino_core::{Holding, InvestorLevel, Portfolio, TradeEvent, TradeSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors produced by the order functions. A failed order leaves the
/// portfolio untouched.
#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    /// The order cost exceeds free cash.
    #[error("order cost {needed} exceeds available cash {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    /// Selling more units than held; `held` is 0 when the symbol is absent.
    #[error("cannot sell {requested} units of {symbol}, only {held} held")]
    InsufficientHoldings {
        symbol: String,
        requested: u32,
        held: u32,
    },
    /// Orders must move at least one unit.
    #[error("order quantity must be > 0")]
    ZeroQuantity,
    /// Execution prices must be strictly positive.
    #[error("order price must be > 0")]
    NonPositivePrice,
}

fn check_order(price: Decimal, quantity: u32) -> Result<(), TradeError> {
    if quantity == 0 {
        return Err(TradeError::ZeroQuantity);
    }
    if price <= Decimal::ZERO {
        return Err(TradeError::NonPositivePrice);
    }
    Ok(())
}

/// Buy `quantity` units of `symbol` at `price` each.
///
/// On success the cost is taken from free cash and the position's average
/// cost is re-blended: `(old_qty * old_avg + cost) / new_qty`. A history
/// entry is appended.
pub fn buy_asset(
    portfolio: &mut Portfolio,
    symbol: &str,
    price: Decimal,
    quantity: u32,
    at: DateTime<Utc>,
) -> Result<(), TradeError> {
    check_order(price, quantity)?;
    let cost = price * Decimal::from(quantity);
    if cost > portfolio.cash {
        return Err(TradeError::InsufficientFunds {
            needed: cost,
            available: portfolio.cash,
        });
    }

    portfolio.cash -= cost;
    match portfolio.holdings.get_mut(symbol) {
        Some(holding) => {
            let old_qty = Decimal::from(holding.quantity);
            let new_quantity = holding.quantity + quantity;
            holding.average_cost =
                (old_qty * holding.average_cost + cost) / Decimal::from(new_quantity);
            holding.quantity = new_quantity;
        }
        None => {
            portfolio.holdings.insert(
                symbol.to_string(),
                Holding {
                    quantity,
                    average_cost: price,
                },
            );
        }
    }
    portfolio.history.push(TradeEvent {
        side: TradeSide::Buy,
        symbol: symbol.to_string(),
        price,
        quantity,
        at,
    });
    debug!(symbol, %price, quantity, "buy executed");
    Ok(())
}

/// Sell `quantity` units of `symbol` at `price` each.
///
/// On success the proceeds are added to free cash. The average cost of the
/// remaining units is unchanged; selling the whole position removes the
/// holding entry entirely. A history entry is appended.
pub fn sell_asset(
    portfolio: &mut Portfolio,
    symbol: &str,
    price: Decimal,
    quantity: u32,
    at: DateTime<Utc>,
) -> Result<(), TradeError> {
    check_order(price, quantity)?;
    let held = portfolio.holdings.get(symbol).map_or(0, |h| h.quantity);
    if held < quantity {
        return Err(TradeError::InsufficientHoldings {
            symbol: symbol.to_string(),
            requested: quantity,
            held,
        });
    }

    portfolio.cash += price * Decimal::from(quantity);
    let remaining = held - quantity;
    if remaining == 0 {
        portfolio.holdings.remove(symbol);
    } else if let Some(holding) = portfolio.holdings.get_mut(symbol) {
        holding.quantity = remaining;
    }
    portfolio.history.push(TradeEvent {
        side: TradeSide::Sell,
        symbol: symbol.to_string(),
        price,
        quantity,
        at,
    });
    debug!(symbol, %price, quantity, "sell executed");
    Ok(())
}

/// Total invested capital at blended purchase prices.
pub fn cost_basis(portfolio: &Portfolio) -> Decimal {
    portfolio
        .holdings
        .values()
        .map(|h| h.average_cost * Decimal::from(h.quantity))
        .sum()
}

/// Current value of all positions at the quoted prices. Symbols without a
/// quote contribute nothing.
pub fn market_value(portfolio: &Portfolio, prices: &BTreeMap<String, Decimal>) -> Decimal {
    portfolio
        .holdings
        .iter()
        .filter_map(|(symbol, h)| {
            prices
                .get(symbol)
                .map(|price| *price * Decimal::from(h.quantity))
        })
        .sum()
}

/// Unrealized profit or loss: market value minus cost basis. A derived
/// read-only view, never stored.
pub fn unrealized_pnl(portfolio: &Portfolio, prices: &BTreeMap<String, Decimal>) -> Decimal {
    market_value(portfolio, prices) - cost_basis(portfolio)
}

/// Broad asset class of a catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Stock,
    Etf,
    Bond,
    Fund,
}

/// One tradable asset of the simulated market.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketAsset {
    pub symbol: String,
    pub name: String,
    pub kind: AssetKind,
    pub sector: String,
    pub region: String,
    /// Anchor price the simulated series starts from.
    pub base_price: Decimal,
    /// Daily-ish volatility of the simulated series.
    pub volatility: f32,
    /// Per-period drift of the simulated series.
    pub drift: f32,
    /// Minimum investor level required to see and trade the asset.
    pub min_level: InvestorLevel,
}

#[allow(clippy::too_many_arguments)]
fn asset(
    symbol: &str,
    name: &str,
    kind: AssetKind,
    sector: &str,
    region: &str,
    base_price: i64,
    volatility: f32,
    drift: f32,
    min_level: InvestorLevel,
) -> MarketAsset {
    MarketAsset {
        symbol: symbol.to_string(),
        name: name.to_string(),
        kind,
        sector: sector.to_string(),
        region: region.to_string(),
        base_price: Decimal::new(base_price, 0),
        volatility,
        drift,
        min_level,
    }
}

/// The full 15-asset catalog, unlocked progressively by investor level:
/// 6 assets at level 1, then 10, 13 and 15.
pub fn all_assets() -> Vec<MarketAsset> {
    use AssetKind::*;
    use InvestorLevel::*;
    vec![
        asset("VWRL", "Vanguard FTSE All-World", Etf, "Global equity", "Global", 100, 0.015, 0.007, Level1),
        asset("AGGG", "iShares Core Global Aggregate Bond", Etf, "Global bonds", "Global", 95, 0.008, 0.003, Level1),
        asset("AAPL", "Apple Inc.", Stock, "Technology", "US", 180, 0.03, 0.01, Level1),
        asset("NESN", "Nestlé", Stock, "Consumer staples", "Europe", 95, 0.02, 0.006, Level1),
        asset("TTE", "TotalEnergies", Stock, "Energy", "Europe", 65, 0.028, 0.008, Level1),
        asset("GLD", "SPDR Gold Shares", Etf, "Commodities", "Global", 180, 0.02, 0.002, Level1),
        asset("HEAL", "iShares Healthcare Innovation", Etf, "Healthcare", "Global", 85, 0.022, 0.007, Level2),
        asset("VFEM", "Vanguard FTSE Emerging Markets", Etf, "Emerging markets", "Global", 45, 0.035, 0.005, Level2),
        asset("JPM", "JPMorgan Chase", Stock, "Financials", "US", 195, 0.028, 0.01, Level2),
        asset("SIE", "Siemens", Stock, "Industrials", "Europe", 175, 0.022, 0.006, Level2),
        asset("EPRA", "Amundi FTSE EPRA NAREIT", Etf, "Real estate", "Global", 28, 0.025, 0.004, Level3),
        asset("BHP", "BHP Group", Stock, "Commodities", "Global", 55, 0.035, 0.006, Level3),
        asset("IEAC", "iShares Euro Corp Bond", Etf, "Corporate bonds", "Europe", 98, 0.012, 0.003, Level3),
        asset("VHYL", "Vanguard FTSE All-World High Dividend", Etf, "Dividend equity", "Global", 52, 0.02, 0.006, Level4),
        asset("MRNA", "Moderna", Stock, "Biotechnology", "US", 95, 0.045, 0.008, Level4),
    ]
}

/// Catalog entries visible at the given investor level.
pub fn visible_assets(level: InvestorLevel) -> Vec<MarketAsset> {
    all_assets()
        .into_iter()
        .filter(|a| a.min_level <= level)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn first_buy_opens_position_at_price() {
        // buy 2 AAPL at 180 against 10000 cash => 9640 cash, avg cost 180
        let mut p = Portfolio::default();
        buy_asset(&mut p, "AAPL", Decimal::new(180, 0), 2, now()).unwrap();
        assert_eq!(p.cash, Decimal::new(9640, 0));
        let h = &p.holdings["AAPL"];
        assert_eq!(h.quantity, 2);
        assert_eq!(h.average_cost, Decimal::new(180, 0));
        assert_eq!(p.history.len(), 1);
        assert_eq!(p.history[0].side, TradeSide::Buy);
    }

    #[test]
    fn second_buy_blends_average_cost() {
        let mut p = Portfolio::default();
        buy_asset(&mut p, "TTE", Decimal::new(60, 0), 10, now()).unwrap();
        buy_asset(&mut p, "TTE", Decimal::new(90, 0), 5, now()).unwrap();
        let h = &p.holdings["TTE"];
        assert_eq!(h.quantity, 15);
        // (10*60 + 5*90) / 15 = 70
        assert_eq!(h.average_cost, Decimal::new(70, 0));
    }

    #[test]
    fn buy_rejects_insufficient_funds_untouched() {
        let mut p = Portfolio::default();
        let before = p.clone();
        let err = buy_asset(&mut p, "JPM", Decimal::new(195, 0), 100, now()).unwrap_err();
        assert_eq!(
            err,
            TradeError::InsufficientFunds {
                needed: Decimal::new(19_500, 0),
                available: Decimal::new(10_000, 0),
            }
        );
        assert_eq!(p, before);
    }

    #[test]
    fn buy_rejects_degenerate_orders() {
        let mut p = Portfolio::default();
        assert_eq!(
            buy_asset(&mut p, "AAPL", Decimal::new(180, 0), 0, now()),
            Err(TradeError::ZeroQuantity)
        );
        assert_eq!(
            buy_asset(&mut p, "AAPL", Decimal::ZERO, 1, now()),
            Err(TradeError::NonPositivePrice)
        );
        assert!(p.history.is_empty());
    }

    #[test]
    fn partial_sell_keeps_average_cost() {
        let mut p = Portfolio::default();
        buy_asset(&mut p, "GLD", Decimal::new(180, 0), 4, now()).unwrap();
        sell_asset(&mut p, "GLD", Decimal::new(200, 0), 1, now()).unwrap();
        let h = &p.holdings["GLD"];
        assert_eq!(h.quantity, 3);
        assert_eq!(h.average_cost, Decimal::new(180, 0));
        assert_eq!(p.cash, Decimal::new(10_000 - 720 + 200, 0));
        assert_eq!(p.history.len(), 2);
    }

    #[test]
    fn sell_to_zero_removes_holding() {
        let mut p = Portfolio::default();
        buy_asset(&mut p, "NESN", Decimal::new(95, 0), 3, now()).unwrap();
        sell_asset(&mut p, "NESN", Decimal::new(95, 0), 3, now()).unwrap();
        assert!(!p.holdings.contains_key("NESN"));
        assert_eq!(p.cash, Decimal::new(10_000, 0));
    }

    #[test]
    fn sell_rejects_more_than_held() {
        let mut p = Portfolio::default();
        buy_asset(&mut p, "SIE", Decimal::new(175, 0), 2, now()).unwrap();
        let before = p.clone();
        let err = sell_asset(&mut p, "SIE", Decimal::new(175, 0), 3, now()).unwrap_err();
        assert_eq!(
            err,
            TradeError::InsufficientHoldings {
                symbol: "SIE".to_string(),
                requested: 3,
                held: 2,
            }
        );
        assert_eq!(p, before);
    }

    #[test]
    fn sell_of_unknown_symbol_reports_zero_held() {
        let mut p = Portfolio::default();
        let err = sell_asset(&mut p, "MRNA", Decimal::new(95, 0), 1, now()).unwrap_err();
        assert_eq!(
            err,
            TradeError::InsufficientHoldings {
                symbol: "MRNA".to_string(),
                requested: 1,
                held: 0,
            }
        );
    }

    #[test]
    fn pnl_is_market_value_minus_cost_basis() {
        let mut p = Portfolio::default();
        buy_asset(&mut p, "AAPL", Decimal::new(180, 0), 2, now()).unwrap();
        let mut prices = BTreeMap::new();
        prices.insert("AAPL".to_string(), Decimal::new(190, 0));
        assert_eq!(cost_basis(&p), Decimal::new(360, 0));
        assert_eq!(market_value(&p, &prices), Decimal::new(380, 0));
        assert_eq!(unrealized_pnl(&p, &prices), Decimal::new(20, 0));
    }

    #[test]
    fn catalog_unlocks_by_level() {
        assert_eq!(all_assets().len(), 15);
        assert_eq!(visible_assets(InvestorLevel::Level1).len(), 6);
        assert_eq!(visible_assets(InvestorLevel::Level2).len(), 10);
        assert_eq!(visible_assets(InvestorLevel::Level3).len(), 13);
        assert_eq!(visible_assets(InvestorLevel::Level4).len(), 15);
        assert!(visible_assets(InvestorLevel::Level1)
            .iter()
            .all(|a| a.min_level == InvestorLevel::Level1));
    }

    proptest! {
        #[test]
        fn blended_cost_matches_weighted_average(
            q1 in 1u32..100, p1 in 1i64..500,
            q2 in 1u32..100, p2 in 1i64..500,
        ) {
            let mut p = Portfolio::default();
            p.cash = Decimal::new(1_000_000, 0);
            buy_asset(&mut p, "X", Decimal::new(p1, 0), q1, now()).unwrap();
            buy_asset(&mut p, "X", Decimal::new(p2, 0), q2, now()).unwrap();
            let h = &p.holdings["X"];
            let expected = (Decimal::new(p1, 0) * Decimal::from(q1)
                + Decimal::new(p2, 0) * Decimal::from(q2))
                / Decimal::from(q1 + q2);
            prop_assert_eq!(h.average_cost, expected);
            prop_assert_eq!(h.quantity, q1 + q2);
        }

        #[test]
        fn history_grows_by_one_per_executed_order(
            qty in 1u32..10, price in 1i64..100, sell_qty in 1u32..10,
        ) {
            let mut p = Portfolio::default();
            buy_asset(&mut p, "Y", Decimal::new(price, 0), qty, now()).unwrap();
            prop_assert_eq!(p.history.len(), 1);
            let res = sell_asset(&mut p, "Y", Decimal::new(price, 0), sell_qty, now());
            let expected = if sell_qty <= qty { 2 } else { 1 };
            prop_assert_eq!(p.history.len(), expected);
            prop_assert_eq!(res.is_ok(), sell_qty <= qty);
        }

        #[test]
        fn round_trip_restores_cash(qty in 1u32..50, price in 1i64..200) {
            let mut p = Portfolio::default();
            let start = p.cash;
            buy_asset(&mut p, "Z", Decimal::new(price, 0), qty, now()).unwrap();
            sell_asset(&mut p, "Z", Decimal::new(price, 0), qty, now()).unwrap();
            prop_assert_eq!(p.cash, start);
            prop_assert!(p.holdings.is_empty());
        }
    }
}

#![deny(warnings)]

//! Economic models for Finomik: the monthly financial cycle and simulated
//! asset price series.
//!
//! This crate provides:
//! - The monthly cycle engine: one simulated month of fixed income/expense
//!   flow, savings interest accrual and reputation/health adjustment
//! - Deterministic per-symbol price series for the market screens

use fino_core::{
    clamp_score, Holding, Profile, SessionSummary, ANNUAL_SAVINGS_RATE, MONTHLY_EXPENSES,
    MONTHLY_INCOME,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors produced by the price series helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Base prices must be strictly positive.
    #[error("invalid base price")]
    InvalidPrice,
    /// Numeric conversion to or from floating point failed.
    #[error("non-finite numeric conversion")]
    NonFinite,
}

/// Monthly savings rate derived from the fixed annual rate.
pub fn monthly_savings_rate() -> Decimal {
    ANNUAL_SAVINGS_RATE / Decimal::from(12)
}

/// Interest the savings fund earns over one month, rounded to cents.
///
/// Rounding is midpoint-away-from-zero to match ordinary monetary rounding.
pub fn savings_interest(fund: Decimal) -> Decimal {
    (fund * monthly_savings_rate()).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Net one month of income and expenses into a balance, flooring at zero.
///
/// There is no debt modeling: a shortfall beyond zero is absorbed, not
/// carried forward. Under the current fixed constants income always exceeds
/// expenses, but the floor is part of the contract.
pub fn settle_month(balance: Decimal, income: Decimal, expenses: Decimal) -> Decimal {
    let next = balance + income - expenses;
    if next < Decimal::ZERO {
        Decimal::ZERO
    } else {
        next
    }
}

/// Run one simulated month against a profile snapshot.
///
/// Pure: the profile is not mutated; applying the result is the caller's
/// job (see fino-progress). Reputation gains +1 on an even completed-module
/// count, health moves by the sign of the balance change. Both scores are
/// clamped to [0, 100].
pub fn run_monthly_cycle(profile: &Profile) -> SessionSummary {
    let balance_before = profile.balance;
    let interest = savings_interest(profile.savings_fund);
    let savings_fund = profile.savings_fund + interest;
    let balance_after = settle_month(balance_before, MONTHLY_INCOME, MONTHLY_EXPENSES);

    let rep_variation: i32 = if profile.completed_count() % 2 == 0 { 1 } else { 0 };
    let health_variation: i32 = match balance_after.cmp(&balance_before) {
        Ordering::Greater => 1,
        Ordering::Less => -1,
        Ordering::Equal => 0,
    };

    SessionSummary {
        income: MONTHLY_INCOME,
        expenses: MONTHLY_EXPENSES,
        balance_before,
        balance_after,
        savings_fund,
        savings_interest: interest,
        reputation_before: profile.reputation,
        reputation_after: clamp_score(i32::from(profile.reputation) + rep_variation),
        health_before: profile.financial_health,
        health_after: clamp_score(i32::from(profile.financial_health) + health_variation),
    }
}

/// One point of a simulated daily price or value series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// 1-based day index within the series.
    pub day: u32,
    pub value: Decimal,
}

fn symbol_seed(symbol: &str) -> u64 {
    // FNV-1a over the symbol bytes; the series only needs to be stable
    // per symbol, not collision free.
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in symbol.bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

/// Deterministic simulated price series for one asset.
///
/// The walk is seeded from the symbol so repeated renders of the same chart
/// agree. Each step applies a small per-asset drift plus uniform noise, and
/// the price never falls below 20% of the base price.
pub fn asset_series(
    symbol: &str,
    base_price: Decimal,
    points: usize,
) -> Result<Vec<PricePoint>, EconError> {
    if base_price <= Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    let base = base_price.to_f64().ok_or(EconError::NonFinite)?;
    let mut rng = ChaCha8Rng::seed_from_u64(symbol_seed(symbol));
    let base_drift = (rng.gen::<f64>() - 0.5) * 0.04;
    let volatility = 0.01 + rng.gen::<f64>() * 0.04;
    let floor = 0.2 * base;

    let mut out = Vec::with_capacity(points);
    let mut price = base;
    for day in 1..=points as u32 {
        let noise = (rng.gen::<f64>() - 0.5) * 2.0 * volatility;
        let change = base_drift / points as f64 + noise;
        price = (price * (1.0 + change)).max(floor);
        let value = Decimal::from_f64(price)
            .ok_or(EconError::NonFinite)?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        out.push(PricePoint { day, value });
    }
    Ok(out)
}

/// Simulated value series of a set of positions, weighted by quantity held.
///
/// Symbols without a quoted price are skipped. An empty holdings map yields
/// a flat zero series so the chart still renders.
pub fn portfolio_series(
    holdings: &BTreeMap<String, Holding>,
    prices: &BTreeMap<String, Decimal>,
    points: usize,
) -> Result<Vec<PricePoint>, EconError> {
    if holdings.is_empty() {
        return Ok((1..=points as u32)
            .map(|day| PricePoint {
                day,
                value: Decimal::ZERO,
            })
            .collect());
    }

    let mut per_asset: Vec<(Vec<PricePoint>, u32)> = Vec::new();
    for (symbol, holding) in holdings {
        if let Some(base) = prices.get(symbol) {
            per_asset.push((asset_series(symbol, *base, points)?, holding.quantity));
        }
    }

    let mut out = Vec::with_capacity(points);
    for i in 0..points {
        let mut total = Decimal::ZERO;
        for (series, quantity) in &per_asset {
            total += series[i].value * Decimal::from(*quantity);
        }
        out.push(PricePoint {
            day: i as u32 + 1,
            value: total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        });
    }
    Ok(out)
}

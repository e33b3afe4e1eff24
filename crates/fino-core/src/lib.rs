#![deny(warnings)]

//! Core domain models and invariants for Finomik.
//!
//! This crate defines the per-session student profile aggregate and the
//! serializable types shared across the simulation, with validation helpers
//! to guarantee basic invariants. All mutation of the profile funnels through
//! the methods here and the engine crates; nothing touches fields ad hoc.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Fixed monthly income applied by every simulated month, in currency units.
pub const MONTHLY_INCOME: Decimal = Decimal::from_parts(1200, 0, 0, false, 0);
/// Fixed monthly expenses deducted by every simulated month.
pub const MONTHLY_EXPENSES: Decimal = Decimal::from_parts(700, 0, 0, false, 0);
/// Annual interest rate of the savings fund (2.5%).
pub const ANNUAL_SAVINGS_RATE: Decimal = Decimal::from_parts(25, 0, 0, false, 3);
/// Liquid balance a fresh profile starts with.
pub const STARTING_BALANCE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
/// Free cash a fresh brokerage portfolio starts with.
pub const STARTING_PORTFOLIO_CASH: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
/// Game coins a fresh profile starts with.
pub const STARTING_COINS: u32 = 1000;
/// Upper bound for reputation, financial health and course progress.
pub const SCORE_MAX: u8 = 100;
/// XP needed per level; `level = xp / XP_PER_LEVEL + 1`.
pub const XP_PER_LEVEL: u32 = 100;

/// Unique identifier for a lesson or minigame node, e.g. "ch1-budgeting-3".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Investor tier gating which market assets are visible and tradable.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum InvestorLevel {
    #[default]
    Level1,
    Level2,
    Level3,
    Level4,
}

impl InvestorLevel {
    /// Numeric rank in 1..=4.
    pub fn rank(self) -> u8 {
        match self {
            InvestorLevel::Level1 => 1,
            InvestorLevel::Level2 => 2,
            InvestorLevel::Level3 => 3,
            InvestorLevel::Level4 => 4,
        }
    }
}

/// Trade direction for portfolio history entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One entry of the append-only trade history. Entries are never mutated
/// or removed once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub side: TradeSide,
    pub symbol: String,
    /// Unit price the order executed at.
    pub price: Decimal,
    pub quantity: u32,
    pub at: DateTime<Utc>,
}

/// A blended average-cost position in a single symbol.
///
/// There is exactly one lot per symbol: buys re-blend the average cost,
/// sells never touch it. Zero-quantity positions are removed from the
/// holdings map rather than retained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Units held, always > 0 while the entry exists.
    pub quantity: u32,
    /// Blended purchase price per unit.
    pub average_cost: Decimal,
}

/// Simulated brokerage account: free cash, positions and trade history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    pub holdings: BTreeMap<String, Holding>,
    pub history: Vec<TradeEvent>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self {
            cash: STARTING_PORTFOLIO_CASH,
            holdings: BTreeMap::new(),
            history: Vec::new(),
        }
    }
}

/// Immutable result of one simulated month, shown on the session summary
/// screen after a chapter completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    /// Savings fund after interest accrual.
    pub savings_fund: Decimal,
    pub savings_interest: Decimal,
    pub reputation_before: u8,
    pub reputation_after: u8,
    pub health_before: u8,
    pub health_after: u8,
}

/// Certificate tier, derived from the completed-module count at stamping time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateType {
    Foundation,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for CertificateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CertificateType::Foundation => "Foundation",
            CertificateType::Intermediate => "Intermediate",
            CertificateType::Advanced => "Advanced",
        };
        f.write_str(s)
    }
}

/// Certificate grade, derived from financial health at stamping time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateGrade {
    Certified,
    Honors,
    HighHonors,
}

impl std::fmt::Display for CertificateGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CertificateGrade::Certified => "Certified",
            CertificateGrade::Honors => "Certified with Honors",
            CertificateGrade::HighHonors => "Certified with High Honors",
        };
        f.write_str(s)
    }
}

/// Write-once completion certificate. Once a profile carries one, no later
/// event changes any of its fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub certificate_type: CertificateType,
    pub grade: CertificateGrade,
    /// Curriculum areas covered, e.g. "Financial Foundations".
    pub areas: Vec<String>,
    /// Cosmetic ID of the form `FM-{year}-{6 base-36 chars}`. Not unique.
    pub certificate_id: String,
    /// Academic year of issue, e.g. "2025-2026".
    pub academic_year: String,
}

/// The single per-session mutable record of a student's game and financial
/// state. One logical writer (the active session), no persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    /// Derived from xp, recomputed on every xp change.
    pub level: u32,
    pub xp: u32,
    pub coins: u32,
    pub streak: u32,
    /// Course progress in [0, 100].
    pub progress: u8,
    /// Completion order of lesson/minigame nodes; a module appears at most once.
    pub completed_modules: Vec<ModuleId>,
    /// Liquid cash, never negative.
    pub balance: Decimal,
    /// Reserved balance accruing monthly interest.
    pub savings_fund: Decimal,
    pub savings_fund_unlocked: bool,
    /// Composite score in [0, 100].
    pub reputation: u8,
    /// Composite score in [0, 100].
    pub financial_health: u8,
    pub investor_level: InvestorLevel,
    /// Write-once: transitions None -> Some exactly once, never reset.
    pub certificate: Option<Certificate>,
    /// Set when a chapter's monthly cycle runs, cleared on dismissal.
    pub last_session_summary: Option<SessionSummary>,
    pub portfolio: Portfolio,
    pub has_seen_invest_onboarding: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "Student".to_string(),
            level: 1,
            xp: 0,
            coins: STARTING_COINS,
            streak: 3,
            progress: 0,
            completed_modules: Vec::new(),
            balance: STARTING_BALANCE,
            savings_fund: Decimal::ZERO,
            savings_fund_unlocked: false,
            reputation: 50,
            financial_health: 50,
            investor_level: InvestorLevel::Level1,
            certificate: None,
            last_session_summary: None,
            portfolio: Portfolio::default(),
            has_seen_invest_onboarding: false,
        }
    }
}

/// Clamp a raw score delta result into the [0, 100] score range.
pub fn clamp_score(value: i32) -> u8 {
    value.clamp(0, i32::from(SCORE_MAX)) as u8
}

/// Level formula shared by every xp-granting path.
pub fn level_for_xp(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

/// Errors for savings fund deposits.
#[derive(Debug, Error, PartialEq)]
pub enum DepositError {
    /// Deposit amounts must be strictly positive.
    #[error("deposit amount must be > 0")]
    NonPositiveAmount,
    /// A deposit can only move cash the profile actually has.
    #[error("deposit of {requested} exceeds liquid balance {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
}

impl Profile {
    /// Number of completed lesson/minigame nodes.
    pub fn completed_count(&self) -> usize {
        self.completed_modules.len()
    }

    /// Whether the given module has already been completed.
    pub fn has_completed(&self, module_id: &ModuleId) -> bool {
        self.completed_modules.contains(module_id)
    }

    /// Grant xp and recompute the derived level.
    pub fn add_xp(&mut self, amount: u32) {
        self.xp += amount;
        self.level = level_for_xp(self.xp);
    }

    pub fn add_coins(&mut self, amount: u32) {
        self.coins += amount;
    }

    /// Spend coins on a shop item. Returns false (and changes nothing) when
    /// the profile cannot afford the price.
    pub fn spend_coins(&mut self, price: u32) -> bool {
        if self.coins < price {
            return false;
        }
        self.coins -= price;
        true
    }

    /// Move liquid balance into the savings fund. Withdrawals are not
    /// supported; the fund only grows via deposits and interest.
    pub fn deposit_to_savings(&mut self, amount: Decimal) -> Result<(), DepositError> {
        if amount <= Decimal::ZERO {
            return Err(DepositError::NonPositiveAmount);
        }
        if amount > self.balance {
            return Err(DepositError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.savings_fund += amount;
        Ok(())
    }

    pub fn set_investor_level(&mut self, level: InvestorLevel) {
        self.investor_level = level;
    }

    pub fn set_savings_fund_unlocked(&mut self, value: bool) {
        self.savings_fund_unlocked = value;
    }

    pub fn complete_invest_onboarding(&mut self) {
        self.has_seen_invest_onboarding = true;
    }

    /// Spending screens lock down once liquid cash hits zero.
    pub fn is_restricted_by_zero_balance(&self) -> bool {
        self.balance == Decimal::ZERO
    }
}

/// Validation errors for profile invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Monetary fields must be non-negative.
    #[error("negative monetary value in {0}")]
    NegativeMoney(&'static str),
    /// Scores and progress live in [0, 100].
    #[error("{0} exceeds the [0, 100] range")]
    ScoreOutOfRange(&'static str),
    /// A module ID appears at most once in the completion ledger.
    #[error("duplicate completed module: {0}")]
    DuplicateModule(String),
    /// Zero-quantity holdings are removed, never retained.
    #[error("zero-quantity holding retained for {0}")]
    EmptyHolding(String),
    /// Level must match the xp-derived formula.
    #[error("level {level} inconsistent with xp {xp}")]
    LevelMismatch { level: u32, xp: u32 },
}

/// Validate a profile against the aggregate invariants.
pub fn validate_profile(profile: &Profile) -> Result<(), ValidationError> {
    if profile.balance < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("balance"));
    }
    if profile.savings_fund < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("savings_fund"));
    }
    if profile.portfolio.cash < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("portfolio.cash"));
    }
    if profile.progress > SCORE_MAX {
        return Err(ValidationError::ScoreOutOfRange("progress"));
    }
    if profile.reputation > SCORE_MAX {
        return Err(ValidationError::ScoreOutOfRange("reputation"));
    }
    if profile.financial_health > SCORE_MAX {
        return Err(ValidationError::ScoreOutOfRange("financial_health"));
    }
    if profile.level != level_for_xp(profile.xp) {
        return Err(ValidationError::LevelMismatch {
            level: profile.level,
            xp: profile.xp,
        });
    }
    let mut seen: BTreeSet<&ModuleId> = BTreeSet::new();
    for id in &profile.completed_modules {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateModule(id.0.clone()));
        }
    }
    for (symbol, holding) in &profile.portfolio.holdings {
        if holding.quantity == 0 {
            return Err(ValidationError::EmptyHolding(symbol.clone()));
        }
        if holding.average_cost < Decimal::ZERO {
            return Err(ValidationError::NegativeMoney("holding.average_cost"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_profile_matches_session_start() {
        let p = Profile::default();
        assert_eq!(p.balance, Decimal::new(1000, 0));
        assert_eq!(p.savings_fund, Decimal::ZERO);
        assert_eq!(p.portfolio.cash, Decimal::new(10_000, 0));
        assert_eq!(p.coins, 1000);
        assert_eq!(p.reputation, 50);
        assert_eq!(p.financial_health, 50);
        assert_eq!(p.level, 1);
        assert_eq!(p.investor_level, InvestorLevel::Level1);
        assert!(p.certificate.is_none());
        assert!(p.completed_modules.is_empty());
        validate_profile(&p).unwrap();
    }

    #[test]
    fn serde_roundtrip_profile() {
        let mut p = Profile::default();
        p.add_xp(120);
        p.portfolio.holdings.insert(
            "AAPL".to_string(),
            Holding {
                quantity: 2,
                average_cost: Decimal::new(180, 0),
            },
        );
        let s = serde_json::to_string(&p).unwrap();
        let back: Profile = serde_json::from_str(&s).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn xp_grants_recompute_level() {
        let mut p = Profile::default();
        p.add_xp(99);
        assert_eq!(p.level, 1);
        p.add_xp(1);
        assert_eq!(p.level, 2);
        p.add_xp(250);
        assert_eq!(p.level, 4);
    }

    #[test]
    fn spend_coins_checks_funds() {
        let mut p = Profile::default();
        assert!(!p.spend_coins(1001));
        assert_eq!(p.coins, 1000);
        assert!(p.spend_coins(300));
        assert_eq!(p.coins, 700);
    }

    #[test]
    fn deposit_moves_balance_into_fund() {
        let mut p = Profile::default();
        p.deposit_to_savings(Decimal::new(400, 0)).unwrap();
        assert_eq!(p.balance, Decimal::new(600, 0));
        assert_eq!(p.savings_fund, Decimal::new(400, 0));
    }

    #[test]
    fn deposit_rejects_overdraft_and_zero() {
        let mut p = Profile::default();
        let err = p.deposit_to_savings(Decimal::new(1001, 0)).unwrap_err();
        assert_eq!(
            err,
            DepositError::InsufficientBalance {
                requested: Decimal::new(1001, 0),
                available: Decimal::new(1000, 0),
            }
        );
        assert_eq!(
            p.deposit_to_savings(Decimal::ZERO),
            Err(DepositError::NonPositiveAmount)
        );
        assert_eq!(p.balance, Decimal::new(1000, 0));
        assert_eq!(p.savings_fund, Decimal::ZERO);
    }

    #[test]
    fn validate_rejects_duplicate_modules() {
        let mut p = Profile::default();
        p.completed_modules.push(ModuleId::new("m1"));
        p.completed_modules.push(ModuleId::new("m1"));
        assert_eq!(
            validate_profile(&p),
            Err(ValidationError::DuplicateModule("m1".to_string()))
        );
    }

    #[test]
    fn validate_rejects_empty_holding() {
        let mut p = Profile::default();
        p.portfolio.holdings.insert(
            "GLD".to_string(),
            Holding {
                quantity: 0,
                average_cost: Decimal::new(180, 0),
            },
        );
        assert_eq!(
            validate_profile(&p),
            Err(ValidationError::EmptyHolding("GLD".to_string()))
        );
    }

    #[test]
    fn investor_level_ranks_are_ordered() {
        assert!(InvestorLevel::Level1 < InvestorLevel::Level4);
        assert_eq!(InvestorLevel::Level3.rank(), 3);
    }

    proptest! {
        #[test]
        fn clamp_score_stays_in_range(v in i32::MIN..i32::MAX) {
            let c = clamp_score(v);
            prop_assert!(c <= SCORE_MAX);
        }

        #[test]
        fn level_formula_is_monotone(xp in 0u32..1_000_000) {
            prop_assert!(level_for_xp(xp + 1) >= level_for_xp(xp));
            prop_assert_eq!(level_for_xp(xp), xp / 100 + 1);
        }

        #[test]
        fn deposits_preserve_total_cash(amount in 1i64..1000) {
            let mut p = Profile::default();
            let before = p.balance + p.savings_fund;
            p.deposit_to_savings(Decimal::new(amount, 0)).unwrap();
            prop_assert_eq!(p.balance + p.savings_fund, before);
            prop_assert!(validate_profile(&p).is_ok());
        }
    }
}

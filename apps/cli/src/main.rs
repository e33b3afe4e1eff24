#![deny(warnings)]

//! Headless CLI: plays a scripted student session against the Finomik core
//! and prints end-of-session KPIs.

use anyhow::Result;
use chrono::Utc;
use fino_core::{validate_profile, InvestorLevel, Profile};
use fino_econ::asset_series;
use fino_portfolio::{buy_asset, sell_asset, unrealized_pnl, visible_assets};
use fino_progress::{
    complete_chapter, complete_lesson, dismiss_session_summary, ChapterOutcome, LessonKind,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const SERIES_DAYS: usize = 30;

fn parse_args() -> (Option<u32>, Option<u64>) {
    let mut chapters: Option<u32> = None;
    let mut seed: Option<u64> = None;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--chapters" => chapters = it.next().and_then(|s| s.parse().ok()),
            "--seed" => seed = it.next().and_then(|s| s.parse().ok()),
            _ => {}
        }
    }
    (chapters, seed)
}

/// Current quote per visible symbol: the last point of its simulated series.
fn quotes(level: InvestorLevel) -> Result<BTreeMap<String, Decimal>> {
    let mut prices = BTreeMap::new();
    for asset in visible_assets(level) {
        let series = asset_series(&asset.symbol, asset.base_price, SERIES_DAYS)?;
        if let Some(last) = series.last() {
            prices.insert(asset.symbol.clone(), last.value);
        }
    }
    Ok(prices)
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let (chapters, seed) = parse_args();
    let chapters = chapters.unwrap_or(3);
    let seed = seed.unwrap_or(42);
    info!(chapters, seed, git_sha = env!("GIT_SHA"), "starting session");

    let mut profile = Profile::default();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let today = Utc::now().date_naive();

    for chapter in 1..=chapters {
        for lesson in 1..=3 {
            complete_lesson(
                &mut profile,
                &format!("ch{chapter}-l{lesson}"),
                LessonKind::Lesson,
            );
        }
        let outcome = complete_chapter(
            &mut profile,
            &format!("ch{chapter}-final"),
            LessonKind::Minigame,
            today,
            &mut rng,
        );
        if let ChapterOutcome::Completed {
            summary,
            certificate_issued,
        } = outcome
        {
            info!(
                chapter,
                balance = %summary.balance_after,
                interest = %summary.savings_interest,
                certificate_issued,
                "chapter closed"
            );
            dismiss_session_summary(&mut profile);
        }

        match chapter {
            1 => {
                profile.set_savings_fund_unlocked(true);
                profile.deposit_to_savings(Decimal::new(200, 0))?;
            }
            2 => {
                profile.complete_invest_onboarding();
                let prices = quotes(profile.investor_level)?;
                buy_asset(
                    &mut profile.portfolio,
                    "AAPL",
                    prices["AAPL"],
                    2,
                    Utc::now(),
                )?;
                buy_asset(&mut profile.portfolio, "GLD", prices["GLD"], 1, Utc::now())?;
            }
            3 => {
                profile.set_investor_level(InvestorLevel::Level2);
                let prices = quotes(profile.investor_level)?;
                sell_asset(
                    &mut profile.portfolio,
                    "AAPL",
                    prices["AAPL"],
                    1,
                    Utc::now(),
                )?;
            }
            _ => {}
        }
    }

    validate_profile(&profile)?;
    let prices = quotes(profile.investor_level)?;

    println!(
        "Profile OK | modules: {} | level: {} | xp: {} | coins: {} | progress: {}%",
        profile.completed_count(),
        profile.level,
        profile.xp,
        profile.coins,
        profile.progress
    );
    println!(
        "KPI | balance: {} | savings: {} | reputation: {} | health: {}",
        profile.balance, profile.savings_fund, profile.reputation, profile.financial_health
    );
    println!(
        "Portfolio | cash: {} | positions: {} | trades: {} | unrealized P&L: {}",
        profile.portfolio.cash,
        profile.portfolio.holdings.len(),
        profile.portfolio.history.len(),
        unrealized_pnl(&profile.portfolio, &prices)
    );
    match &profile.certificate {
        Some(cert) => println!(
            "Certificate | {} | {} | {} | {}",
            cert.certificate_type, cert.grade, cert.certificate_id, cert.academic_year
        ),
        None => println!("Certificate | not yet earned"),
    }

    Ok(())
}

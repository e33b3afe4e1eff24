#![deny(warnings)]

//! Lesson and chapter progression for Finomik.
//!
//! Tracks which lesson/minigame nodes are completed, grants xp/coin rewards,
//! runs the monthly financial cycle when a chapter's closing node completes,
//! and evaluates the write-once certificate rule.
//!
//! All completion entry points are idempotent: re-completing a module is a
//! recognized non-error outcome that changes nothing.

use chrono::{Datelike, NaiveDate};
use fino_core::{
    clamp_score, Certificate, CertificateGrade, CertificateType, ModuleId, Profile,
    SessionSummary, SCORE_MAX,
};
use fino_econ::run_monthly_cycle;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Completed modules required before a certificate can be stamped.
pub const CERTIFICATE_THRESHOLD: usize = 8;
/// Course progress granted per completed lesson, capped at 100.
pub const PROGRESS_PER_LESSON: u8 = 5;

/// Kind of progression node, deciding the reward schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LessonKind {
    Lesson,
    Minigame,
}

impl LessonKind {
    /// XP granted on completion: 20 for a lesson, 100 for a minigame.
    pub fn xp_reward(self) -> u32 {
        match self {
            LessonKind::Lesson => 20,
            LessonKind::Minigame => 100,
        }
    }

    /// Coins granted on completion: 10 for a lesson, 50 for a minigame.
    pub fn coin_reward(self) -> u32 {
        match self {
            LessonKind::Lesson => 10,
            LessonKind::Minigame => 50,
        }
    }
}

/// Result of a plain lesson completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LessonOutcome {
    Completed { xp_gained: u32, coins_gained: u32 },
    /// The module was already in the ledger; nothing changed.
    AlreadyCompleted,
}

/// Result of completing a chapter's closing node.
#[derive(Clone, Debug, PartialEq)]
pub enum ChapterOutcome {
    Completed {
        /// The month the completion triggered, also stored on the profile.
        summary: SessionSummary,
        /// Whether this completion stamped the certificate.
        certificate_issued: bool,
    },
    /// The module was already in the ledger; nothing changed.
    AlreadyCompleted,
}

fn apply_lesson_rewards(profile: &mut Profile, module_id: ModuleId, kind: LessonKind) {
    profile.completed_modules.push(module_id);
    profile.progress = clamp_score(i32::from(profile.progress) + i32::from(PROGRESS_PER_LESSON));
    profile.add_xp(kind.xp_reward());
    profile.add_coins(kind.coin_reward());
}

/// Complete a single lesson or minigame mid-chapter. No monthly cycle runs.
pub fn complete_lesson(profile: &mut Profile, module_id: &str, kind: LessonKind) -> LessonOutcome {
    let id = ModuleId::new(module_id);
    if profile.has_completed(&id) {
        return LessonOutcome::AlreadyCompleted;
    }
    apply_lesson_rewards(profile, id, kind);
    LessonOutcome::Completed {
        xp_gained: kind.xp_reward(),
        coins_gained: kind.coin_reward(),
    }
}

/// Complete a chapter's final node: run one simulated month, apply it, then
/// grant the lesson rewards.
///
/// The cycle is computed on the pre-completion snapshot, so the even/odd
/// reputation rule sees the module count *before* this node is appended.
/// Certificate eligibility is evaluated afterwards against the updated count
/// and the post-cycle health score. The summary is stored on the profile
/// until dismissed.
pub fn complete_chapter<R: Rng + ?Sized>(
    profile: &mut Profile,
    module_id: &str,
    kind: LessonKind,
    today: NaiveDate,
    rng: &mut R,
) -> ChapterOutcome {
    let id = ModuleId::new(module_id);
    if profile.has_completed(&id) {
        return ChapterOutcome::AlreadyCompleted;
    }

    let summary = run_monthly_cycle(profile);
    profile.balance = summary.balance_after;
    profile.savings_fund = summary.savings_fund;
    profile.reputation = summary.reputation_after;
    profile.financial_health = summary.health_after;
    apply_lesson_rewards(profile, id, kind);
    profile.last_session_summary = Some(summary.clone());

    let had_certificate = profile.certificate.is_some();
    profile.certificate = evaluate_certificate(
        profile.certificate.take(),
        profile.completed_count(),
        summary.health_after,
        today,
        rng,
    );
    let certificate_issued = !had_certificate && profile.certificate.is_some();
    if certificate_issued {
        info!(module_id, "certificate stamped");
    }

    ChapterOutcome::Completed {
        summary,
        certificate_issued,
    }
}

/// Clear the stored session summary. Gates the one-time full-screen summary
/// view; nothing else changes.
pub fn dismiss_session_summary(profile: &mut Profile) {
    profile.last_session_summary = None;
}

/// Complete a module with membership and progress tracking only, no rewards.
/// Returns false when the module was already completed.
pub fn complete_module(profile: &mut Profile, module_id: &str) -> bool {
    let id = ModuleId::new(module_id);
    if profile.has_completed(&id) {
        return false;
    }
    profile.completed_modules.push(id);
    profile.progress = clamp_score(i32::from(profile.progress) + i32::from(PROGRESS_PER_LESSON));
    true
}

/// Bulk-complete a chapter's modules, skipping the ones already completed.
/// A developer/teacher shortcut: when anything was appended, progress is
/// force-set to 100 instead of accumulating. Returns the number appended.
pub fn auto_complete_chapter(profile: &mut Profile, module_ids: &[ModuleId]) -> usize {
    let fresh: Vec<ModuleId> = module_ids
        .iter()
        .filter(|id| !profile.has_completed(id))
        .cloned()
        .collect();
    if fresh.is_empty() {
        return 0;
    }
    let added = fresh.len();
    profile.completed_modules.extend(fresh);
    profile.progress = SCORE_MAX;
    added
}

const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn certificate_id<R: Rng + ?Sized>(year: i32, rng: &mut R) -> String {
    // Cosmetic ID, not unique; collisions are acceptable.
    let suffix: String = (0..6)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("FM-{year}-{suffix}")
}

/// Evaluate the certificate rule.
///
/// An existing certificate is always returned unchanged (write-once). Below
/// eight completed modules no certificate is stamped. Otherwise the tier
/// follows the module count (25/15 thresholds) and the grade follows the
/// post-cycle health score (72/65 thresholds).
pub fn evaluate_certificate<R: Rng + ?Sized>(
    existing: Option<Certificate>,
    completed_modules: usize,
    health: u8,
    today: NaiveDate,
    rng: &mut R,
) -> Option<Certificate> {
    if existing.is_some() {
        return existing;
    }
    if completed_modules < CERTIFICATE_THRESHOLD {
        return None;
    }

    let certificate_type = if completed_modules >= 25 {
        CertificateType::Advanced
    } else if completed_modules >= 15 {
        CertificateType::Intermediate
    } else {
        CertificateType::Foundation
    };
    let grade = if health >= 72 {
        CertificateGrade::HighHonors
    } else if health >= 65 {
        CertificateGrade::Honors
    } else {
        CertificateGrade::Certified
    };
    let year = today.year();
    Some(Certificate {
        certificate_type,
        grade,
        areas: vec![
            "Financial Foundations".to_string(),
            "Monthly Budgeting and Savings".to_string(),
        ],
        certificate_id: certificate_id(year, rng),
        academic_year: format!("{}-{}", year - 1, year),
    })
}

//! Analytics over a user's run history. Pure functions: the route layer
//! fetches the runs and hands them in; nothing here touches storage.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::test_run::TestRun;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_tests: u64,
    pub total_questions: i64,
    pub completed_questions: i64,
    pub average_time: f64,
}

/// Error frequency per category. This counts how often a category shows up
/// among wrong questions; it is deliberately not a percentage of anything.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CategoryErrors {
    pub total: u64,
    pub subcategories: BTreeMap<String, u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TimeDistribution {
    pub under_30s: u64,
    pub from_30s_to_60s: u64,
    pub from_60s_to_90s: u64,
    pub over_90s: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: DateTime<Utc>,
    pub average_time_per_question: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub summary: Summary,
    pub category_breakdown: BTreeMap<String, CategoryErrors>,
    pub time_distribution: TimeDistribution,
    pub improvement_trend: Vec<TrendPoint>,
    pub streak_days: u64,
}

pub fn summary(runs: &[TestRun]) -> Summary {
    let total_tests = runs.len() as u64;
    let total_questions = runs.iter().map(|r| r.total_questions).sum();
    let completed_questions = runs.iter().map(|r| r.completed_questions).sum();
    let average_time = if runs.is_empty() {
        0.0
    } else {
        runs.iter().map(|r| r.total_time).sum::<f64>() / runs.len() as f64
    };
    Summary {
        total_tests,
        total_questions,
        completed_questions,
        average_time,
    }
}

pub fn category_breakdown(runs: &[TestRun]) -> BTreeMap<String, CategoryErrors> {
    let mut breakdown: BTreeMap<String, CategoryErrors> = BTreeMap::new();
    for run in runs {
        for wrong in &run.wrong_questions {
            let entry = breakdown.entry(wrong.category.clone()).or_default();
            entry.total += 1;
            *entry
                .subcategories
                .entry(wrong.subcategory.clone())
                .or_default() += 1;
        }
    }
    breakdown
}

pub fn time_distribution(runs: &[TestRun]) -> TimeDistribution {
    let mut dist = TimeDistribution::default();
    for time in runs.iter().flat_map(|r| r.question_times.0.iter()) {
        if *time < 30.0 {
            dist.under_30s += 1;
        } else if *time <= 60.0 {
            dist.from_30s_to_60s += 1;
        } else if *time <= 90.0 {
            dist.from_60s_to_90s += 1;
        } else {
            dist.over_90s += 1;
        }
    }
    dist
}

/// One point per run, oldest first: average seconds per completed question.
pub fn improvement_trend(runs: &[TestRun]) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = runs
        .iter()
        .map(|run| TrendPoint {
            date: run.created_at,
            average_time_per_question: if run.completed_questions > 0 {
                run.total_time / run.completed_questions as f64
            } else {
                0.0
            },
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

/// Consecutive calendar days with at least one run, ending `today` (UTC is
/// the reference zone). A day without a run, including today itself, ends
/// the streak.
pub fn streak(runs: &[TestRun], today: NaiveDate) -> u64 {
    let days: BTreeSet<NaiveDate> = runs.iter().map(|r| r.created_at.date_naive()).collect();
    let mut count = 0;
    let mut day = today;
    while days.contains(&day) {
        count += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    count
}

pub fn dashboard(runs: &[TestRun], today: NaiveDate) -> DashboardStats {
    DashboardStats {
        summary: summary(runs),
        category_breakdown: category_breakdown(runs),
        time_distribution: time_distribution(runs),
        improvement_trend: improvement_trend(runs),
        streak_days: streak(runs, today),
    }
}

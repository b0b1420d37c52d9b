//! Deterministic 0-100 health score computed purely from a run's findings.

use crate::models::{AnalysisRun, RunStatus};

/// Health bands, informational only — never influence the numeric score.
pub const EXCELLENT_MIN: u32 = 90;
pub const GOOD_MIN: u32 = 70;
pub const FAIR_MIN: u32 = 50;

const PARTIAL_PENALTY: u32 = 5;
const MAX_DEDUCTION: u32 = 100;

/// Computes the score: start at 100, subtract each finding's severity
/// deduction (capped at 100 total), subtract 5 more for a partial run, 0 for
/// a failed one. A pure function of `run.results` — two runs with the same
/// findings and the same status always score the same.
pub fn score(run: &AnalysisRun) -> u32 {
    if run.status == RunStatus::Failed {
        return 0;
    }

    let deduction: u32 =
        run.findings_flat().iter().map(|f| f.severity.score_deduction()).sum::<u32>().min(MAX_DEDUCTION);
    let mut score = 100u32.saturating_sub(deduction);

    if run.status == RunStatus::Partial {
        score = score.saturating_sub(PARTIAL_PENALTY);
    }

    score.clamp(0, 100)
}

/// Human-readable band for a score, per the documented 90/70/50 cutoffs.
pub fn band(score: u32) -> &'static str {
    if score >= EXCELLENT_MIN {
        "excellent"
    } else if score >= GOOD_MIN {
        "good"
    } else if score >= FAIR_MIN {
        "fair"
    } else {
        "poor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::FindingInput;
    use crate::models::{AnalyzerResult, Confidence, Finding, Product, Severity};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn base_run() -> AnalysisRun {
        AnalysisRun {
            run_id: uuid::Uuid::nil(),
            deployment_id: "dep-1".into(),
            product_type: Product::Stream,
            product_version: None,
            started_at: chrono::Utc::now(),
            completed_at: None,
            status: RunStatus::Completed,
            objectives_requested: vec!["health".into()],
            objectives_completed: vec!["health".into()],
            objectives_failed: vec![],
            results: BTreeMap::new(),
            health_score: 0,
            api_calls_used: 1,
            api_calls_budget: 100,
            duration_seconds: 1.0,
        }
    }

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding::new(id, "health", severity, "t", "d", FindingInput {
            confidence_level: Confidence::Medium,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn no_findings_scores_100() {
        assert_eq!(score(&base_run()), 100);
    }

    #[test]
    fn failed_run_always_scores_0() {
        let mut run = base_run();
        run.status = RunStatus::Failed;
        run.results.insert(
            "health".into(),
            AnalyzerResult::success("health", Duration::from_secs(1), 1, vec![finding("f-1", Severity::Low)], vec![]),
        );
        assert_eq!(score(&run), 0);
    }

    #[test]
    fn deductions_match_severity_table() {
        let mut run = base_run();
        run.results.insert(
            "health".into(),
            AnalyzerResult::success(
                "health",
                Duration::from_secs(1),
                1,
                vec![finding("f-1", Severity::Critical)],
                vec![],
            ),
        );
        assert_eq!(score(&run), 75);
    }

    #[test]
    fn partial_run_subtracts_five_more() {
        let mut run = base_run();
        run.status = RunStatus::Partial;
        run.objectives_failed.push("security".into());
        assert_eq!(score(&run), 95);
    }

    #[test]
    fn deduction_cannot_drive_score_below_zero() {
        let mut run = base_run();
        let findings: Vec<Finding> =
            (0..10).map(|i| finding(&format!("f-{i}"), Severity::Critical)).collect();
        run.results.insert("health".into(), AnalyzerResult::success("health", Duration::from_secs(1), 1, findings, vec![]));
        assert_eq!(score(&run), 0);
    }

    #[test]
    fn bands_match_documented_cutoffs() {
        assert_eq!(band(100), "excellent");
        assert_eq!(band(90), "excellent");
        assert_eq!(band(89), "good");
        assert_eq!(band(70), "good");
        assert_eq!(band(69), "fair");
        assert_eq!(band(50), "fair");
        assert_eq!(band(49), "poor");
        assert_eq!(band(0), "poor");
    }
}

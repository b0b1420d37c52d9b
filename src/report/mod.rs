//! Emits a finalized [`AnalysisRun`] as JSON or Markdown. Read-only: neither
//! emitter mutates the run it's given.

use crate::models::{AnalysisRun, Severity};
use std::fmt::Write as _;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to serialize run as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The run as stable-field-order JSON: 1-to-1 with the data model, ISO-8601
/// UTC timestamps (via `chrono`'s `Serialize`), and no secrets — the run
/// never carries a credential in the first place, so there is nothing to
/// scrub here.
pub fn to_json(run: &AnalysisRun) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(run)?)
}

/// A human-readable Markdown report: a summary header, then each objective's
/// findings grouped by severity (critical first).
pub fn to_markdown(run: &AnalysisRun) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Health Assessment: {}", run.deployment_id);
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Status**: {}", run.status);
    let _ = writeln!(out, "- **Health score**: {} ({})", run.health_score, crate::scoring::band(run.health_score));
    let _ = writeln!(out, "- **Product**: {}", run.product_type.as_str());
    if let Some(version) = &run.product_version {
        let _ = writeln!(out, "- **Version**: {version}");
    }
    let _ = writeln!(out, "- **Findings**: {}", run.findings_flat().len());
    let _ = writeln!(out, "- **Recommendations**: {}", run.recommendations_flat().len());
    let _ = writeln!(out, "- **API calls used**: {}/{}", run.api_calls_used, run.api_calls_budget);
    let _ = writeln!(out, "- **Duration**: {:.1}s", run.duration_seconds);
    if !run.objectives_failed.is_empty() {
        let _ = writeln!(out, "- **Failed objectives**: {}", run.objectives_failed.join(", "));
    }
    let _ = writeln!(out);

    for (objective, result) in &run.results {
        if result.findings.is_empty() && result.recommendations.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {objective}");
        let _ = writeln!(out);

        for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low, Severity::Info] {
            let findings: Vec<_> = result.findings.iter().filter(|f| f.severity == severity).collect();
            if findings.is_empty() {
                continue;
            }
            let _ = writeln!(out, "### {severity}");
            let _ = writeln!(out);
            for finding in findings {
                let _ = writeln!(out, "- **{}**: {}", finding.title, finding.description);
                if !finding.affected_components.is_empty() {
                    let _ = writeln!(out, "  - Affected: {}", finding.affected_components.join(", "));
                }
            }
            let _ = writeln!(out);
        }

        if !result.recommendations.is_empty() {
            let _ = writeln!(out, "### Recommendations");
            let _ = writeln!(out);
            for rec in &result.recommendations {
                let _ = writeln!(out, "- **[{}] {}**: {}", rec.priority, rec.title, rec.description);
            }
            let _ = writeln!(out);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::FindingInput;
    use crate::models::{AnalyzerResult, Confidence, Finding, Product, RunStatus};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn sample_run() -> AnalysisRun {
        let finding = Finding::new(
            "health-1",
            "health",
            Severity::Critical,
            "Worker unreachable",
            "Worker w-1 has not reported in over 5 minutes.",
            FindingInput { affected_components: vec!["w-1".into()], confidence_level: Confidence::High, ..Default::default() },
        )
        .unwrap();
        let mut results = BTreeMap::new();
        results.insert(
            "health".to_string(),
            AnalyzerResult::success("health", Duration::from_millis(250), 2, vec![finding], vec![]),
        );
        AnalysisRun {
            run_id: uuid::Uuid::nil(),
            deployment_id: "prod-cluster".into(),
            product_type: Product::Stream,
            product_version: Some("4.15.0".into()),
            started_at: chrono::Utc::now(),
            completed_at: Some(chrono::Utc::now()),
            status: RunStatus::Completed,
            objectives_requested: vec!["health".into()],
            objectives_completed: vec!["health".into()],
            objectives_failed: vec![],
            results,
            health_score: 75,
            api_calls_used: 3,
            api_calls_budget: 100,
            duration_seconds: 1.2,
        }
    }

    #[test]
    fn json_round_trips_through_serde() {
        let json = to_json(&sample_run()).unwrap();
        let parsed: AnalysisRun = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.deployment_id, "prod-cluster");
        assert_eq!(parsed.findings_flat().len(), 1);
    }

    #[test]
    fn markdown_includes_summary_and_findings() {
        let md = to_markdown(&sample_run());
        assert!(md.contains("# Health Assessment: prod-cluster"));
        assert!(md.contains("Health score"));
        assert!(md.contains("Worker unreachable"));
        assert!(md.contains("### critical"));
    }

    #[test]
    fn markdown_skips_objectives_with_no_findings_or_recommendations() {
        let mut run = sample_run();
        run.results.insert(
            "config".to_string(),
            AnalyzerResult::success("config", Duration::from_millis(10), 1, vec![], vec![]),
        );
        let md = to_markdown(&run);
        assert!(!md.contains("## config"));
    }
}

//! TLS, certificate validation, hardcoded secrets, and auth posture scoring.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Severity};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;

pub struct SecurityAnalyzer;

const OBJECTIVE: &str = "security";

const TLS_DISABLED_DEDUCTION: i32 = 30;
const WEAK_TLS_DEDUCTION: i32 = 20;
const CERT_OFF_DEDUCTION: i32 = 15;
const SECRET_DEDUCTION: i32 = 5;
const SECRET_DEDUCTION_CAP: i32 = 25;
const AUTHZ_OFF_DEDUCTION: i32 = 10;

static SECRET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(password|secret|api[_-]?key|token)\s*[:=]\s*"([^"$]{4,})""#).unwrap()
});

const PLACEHOLDER_MARKERS: &[&str] = &["changeme", "placeholder", "example", "xxx", "<", "todo"];

fn is_placeholder(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
}

#[async_trait]
impl super::Analyzer for SecurityAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        3
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let mut api_calls = 0u32;

        let outputs = match client.get_outputs(&ctx.cancel).await {
            Ok(o) => {
                api_calls += 1;
                o
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };
        let inputs = match client.get_inputs(&ctx.cancel).await {
            Ok(i) => {
                api_calls += 1;
                i
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };
        let pipelines = match client.get_pipelines(&ctx.cancel).await {
            Ok(p) => {
                api_calls += 1;
                p
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };

        let mut findings = Vec::new();
        let mut deduction: i32 = 0;
        let mut secret_deduction = 0;
        let mut n = 0usize;

        for output in &outputs {
            let tls = output.raw.get("tls");
            let tls_disabled = tls.and_then(|t| t.get("disabled")).and_then(|v| v.as_bool()).unwrap_or(false)
                || tls.is_none();
            if tls_disabled {
                n += 1;
                deduction += TLS_DISABLED_DEDUCTION;
                push(&mut findings, OBJECTIVE, n, Severity::High, "TLS disabled on output",
                    format!("Output {} does not have TLS enabled.", output.id), vec![output.id.clone()]);
            } else if let Some(version) = tls.and_then(|t| t.get("minVersion")).and_then(|v| v.as_str()) {
                if matches!(version, "TLSv1" | "TLSv1.0" | "TLSv1.1") {
                    n += 1;
                    deduction += WEAK_TLS_DEDUCTION;
                    push(&mut findings, OBJECTIVE, n, Severity::Medium, "Weak TLS version configured",
                        format!("Output {} allows {} which is considered weak.", output.id, version), vec![output.id.clone()]);
                }
            }
            if tls.and_then(|t| t.get("rejectUnauthorized")).and_then(|v| v.as_bool()) == Some(false) {
                n += 1;
                deduction += CERT_OFF_DEDUCTION;
                push(&mut findings, OBJECTIVE, n, Severity::Medium, "Certificate validation disabled",
                    format!("Output {} does not validate the remote certificate.", output.id), vec![output.id.clone()]);
            }
            if output.raw.get("authType").and_then(|v| v.as_str()).is_none() {
                n += 1;
                deduction += AUTHZ_OFF_DEDUCTION;
                push(&mut findings, OBJECTIVE, n, Severity::Low, "No authentication configured on output",
                    format!("Output {} has no authentication method configured.", output.id), vec![output.id.clone()]);
            }
        }

        for pipeline in &pipelines {
            let raw_text = pipeline.raw.to_string();
            for capture in SECRET_REGEX.captures_iter(&raw_text) {
                let value = &capture[2];
                if value.starts_with("${") || is_placeholder(value) {
                    continue;
                }
                if secret_deduction < SECRET_DEDUCTION_CAP {
                    secret_deduction = (secret_deduction + SECRET_DEDUCTION).min(SECRET_DEDUCTION_CAP);
                }
                n += 1;
                push(&mut findings, OBJECTIVE, n, Severity::Critical, "Hardcoded secret in pipeline configuration",
                    format!("Pipeline {} appears to contain a hardcoded credential rather than a ${{VAR}} reference.", pipeline.id),
                    vec![pipeline.id.clone()]);
                break;
            }
        }
        deduction += secret_deduction;

        for input in &inputs {
            if input.raw.get("authType").and_then(|v| v.as_str()).is_none() {
                n += 1;
                push(&mut findings, OBJECTIVE, n, Severity::High, "No authentication configured on input",
                    format!("Input {} accepts data with no authentication configured.", input.id), vec![input.id.clone()]);
            }
        }

        let posture_score = (100 - deduction).clamp(0, 100);
        n += 1;
        push(
            &mut findings,
            OBJECTIVE,
            n,
            if posture_score < 50 { Severity::High } else { Severity::Info },
            "Security posture score",
            format!("Aggregate security posture score is {posture_score}/100."),
            Vec::new(),
        );

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), api_calls, findings, Vec::new());
        result.sort_findings_by_severity();
        result
    }
}

fn push(
    findings: &mut Vec<Finding>,
    objective: &str,
    n: usize,
    severity: Severity,
    title: &str,
    description: String,
    affected_components: Vec<String>,
) {
    if let Ok(f) = Finding::new(
        AnalyzerContext::finding_id(objective, n),
        objective,
        severity,
        title,
        description,
        FindingInput { affected_components, ..Default::default() },
    ) {
        findings.push(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_values_are_not_flagged() {
        assert!(is_placeholder("CHANGEME"));
        assert!(is_placeholder("example-secret"));
        assert!(!is_placeholder("sup3rSecretValue1"));
    }

    #[test]
    fn secret_regex_ignores_env_var_references() {
        let text = r#"{"password": "${CRIBL_DB_PASSWORD}"}"#;
        let caught = SECRET_REGEX.captures(text);
        assert!(caught.is_none() || caught.unwrap()[2].starts_with("${"));
    }

    #[test]
    fn secret_regex_matches_a_literal_secret() {
        let text = r#"{"apiKey": "abcd1234efgh5678"}"#;
        assert!(SECRET_REGEX.is_match(text));
    }

    #[test]
    fn deduction_caps_match_spec() {
        assert_eq!(TLS_DISABLED_DEDUCTION, 30);
        assert_eq!(WEAK_TLS_DEDUCTION, 20);
        assert_eq!(CERT_OFF_DEDUCTION, 15);
        assert_eq!(SECRET_DEDUCTION, 5);
        assert_eq!(SECRET_DEDUCTION_CAP, 25);
        assert_eq!(AUTHZ_OFF_DEDUCTION, 10);
    }
}

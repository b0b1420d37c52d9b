//! Shared enumerations for the finding/recommendation data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an observation, ordered least to most severe.
///
/// Declared in ascending order so that `#[derive(PartialOrd, Ord)]` gives the
/// natural "more severe sorts higher" comparison used throughout the
/// analyzer framework and the health scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Point deduction applied by the health scorer for one finding of this severity.
    pub fn score_deduction(self) -> u32 {
        match self {
            Severity::Critical => 25,
            Severity::High => 10,
            Severity::Medium => 4,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a recommendation, ordered least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    P3,
    P2,
    P1,
    P0,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::P3 => "p3",
            Priority::P2 => "p2",
            Priority::P1 => "p1",
            Priority::P0 => "p0",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How confident the analyzer is in a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Label a confidence level from the size of a historical sample, per the
    /// predictive sub-engine's calibration (`>=20` high, `>=10` medium, else low).
    pub fn from_sample_size(n: usize) -> Self {
        if n >= 20 {
            Confidence::High
        } else if n >= 10 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// The Cribl product kind under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    Stream,
    Edge,
    Lake,
    Search,
}

impl Product {
    pub const ALL: [Product; 4] = [Product::Stream, Product::Edge, Product::Lake, Product::Search];

    pub fn as_str(self) -> &'static str {
        match self {
            Product::Stream => "stream",
            Product::Edge => "edge",
            Product::Lake => "lake",
            Product::Search => "search",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Product {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stream" => Ok(Product::Stream),
            "edge" => Ok(Product::Edge),
            "lake" => Ok(Product::Lake),
            "search" => Ok(Product::Search),
            other => Err(format!("unknown product: {other}")),
        }
    }
}

/// Outcome of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Relative cost of carrying out a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationEffort {
    Low,
    Medium,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_least_to_most_severe() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn priority_orders_least_to_most_urgent() {
        assert!(Priority::P3 < Priority::P2);
        assert!(Priority::P2 < Priority::P1);
        assert!(Priority::P1 < Priority::P0);
    }

    #[test]
    fn confidence_from_sample_size_matches_calibration() {
        assert_eq!(Confidence::from_sample_size(25), Confidence::High);
        assert_eq!(Confidence::from_sample_size(20), Confidence::High);
        assert_eq!(Confidence::from_sample_size(19), Confidence::Medium);
        assert_eq!(Confidence::from_sample_size(10), Confidence::Medium);
        assert_eq!(Confidence::from_sample_size(9), Confidence::Low);
    }

    #[test]
    fn product_round_trips_through_str() {
        for p in Product::ALL {
            assert_eq!(p.as_str().parse::<Product>().unwrap(), p);
        }
    }
}

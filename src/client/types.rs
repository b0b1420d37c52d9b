//! Normalized shapes returned by the API client. Fields an analyzer commonly
//! needs are promoted to named, typed fields; everything else is preserved
//! verbatim under `raw` so an analyzer can read a deployment-specific field
//! the client doesn't model without a round trip through the wire format.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

/// A Stream worker or an Edge node, normalized to one shape per §4.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub hostname: Option<String>,
    pub status: WorkerStatus,
    pub group: Option<String>,
    pub last_msg_time_millis: Option<i64>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
    pub process_count: Option<u32>,
    pub raw: serde_json::Value,
}

macro_rules! entity {
    ($name:ident) => {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $name {
            pub id: String,
            #[serde(default)]
            pub name: Option<String>,
            #[serde(flatten)]
            pub raw: serde_json::Value,
        }
    };
}

entity!(Pipeline);
entity!(Route);
entity!(Input);
entity!(Output);
entity!(Lookup);
entity!(Parser);
entity!(LakeDataset);
entity!(Lakehouse);
entity!(SearchJob);
entity!(SearchDataset);
entity!(Dashboard);
entity!(SavedSearch);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub version: String,
    pub product: Option<String>,
    pub response_time: std::time::Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub values: std::collections::HashMap<String, f64>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseInfo {
    pub consumed: Option<f64>,
    pub allocated: Option<f64>,
    pub history: Vec<f64>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub dataset_id: String,
    pub last_write_millis: Option<i64>,
    pub raw: serde_json::Value,
}

// These four wrap an endpoint whose meaningful fields live at varying depths
// and under varying key casings across Cribl versions; rather than pin a
// brittle field-for-field `Deserialize`, each is built from the raw JSON
// value the same way `normalize_stream_worker` builds a `Worker`.

impl<'de> Deserialize<'de> for SystemStatus {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(SystemStatus { raw: serde_json::Value::deserialize(d)? })
    }
}

impl<'de> Deserialize<'de> for HealthStatus {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(d)?;
        let healthy = match raw.get("status").and_then(|v| v.as_str()) {
            Some(s) => s.eq_ignore_ascii_case("healthy"),
            None => raw.get("healthy").and_then(|v| v.as_bool()).unwrap_or(false),
        };
        Ok(HealthStatus { healthy, raw })
    }
}

impl<'de> Deserialize<'de> for Metrics {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(d)?;
        let mut values = std::collections::HashMap::new();
        flatten_numeric(&raw, "", &mut values);
        Ok(Metrics { values, raw })
    }
}

/// Walks a JSON object recursively, recording every numeric leaf under its
/// dotted path (`"pq"."queue"."size"` -> `"pq.queue.size"`), matching Cribl's
/// own dotted metric-name convention.
fn flatten_numeric(value: &serde_json::Value, prefix: &str, out: &mut std::collections::HashMap<String, f64>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                flatten_numeric(child, &path, out);
            }
        },
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                out.insert(prefix.to_string(), f);
            }
        },
        _ => {},
    }
}

impl<'de> Deserialize<'de> for LicenseInfo {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(d)?;
        let consumed = raw.get("consumed").or_else(|| raw.get("used")).and_then(|v| v.as_f64());
        let allocated =
            raw.get("allocated").or_else(|| raw.get("max")).or_else(|| raw.get("limit")).and_then(|v| v.as_f64());
        let history = raw
            .get("history")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_f64()).collect())
            .unwrap_or_default();
        Ok(LicenseInfo { consumed, allocated, history, raw })
    }
}

impl<'de> Deserialize<'de> for DatasetStats {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(d)?;
        let dataset_id = raw.get("id").or_else(|| raw.get("datasetId")).and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let last_write_millis = raw
            .get("lastWriteTime")
            .or_else(|| raw.get("lastWriteMillis"))
            .and_then(|v| v.as_i64());
        Ok(DatasetStats { dataset_id, last_write_millis, raw })
    }
}

// SPDX-License-Identifier: MIT

//! Per-node execution traces.
//!
//! The runtime emits one [`TraceRecord`] per node attempt. Sinks must never
//! fail a run: the runtime downgrades recording errors to warnings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::backend::model::TokenUsage;
use crate::error::TraceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Succeeded,
    Failed,
    /// Failed but downgraded by `on_error: continue`.
    Continued,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub run_id: Uuid,
    pub node_id: String,
    pub status: NodeStatus,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub token_usage: Option<TokenUsage>,
    /// Estimated cost in USD, when the sink can price the model.
    pub cost: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}

#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn record(&self, record: &TraceRecord) -> Result<(), TraceError>;
}

/// Default sink: one structured log line per node.
#[derive(Default)]
pub struct LogTraceSink;

#[async_trait]
impl TraceSink for LogTraceSink {
    async fn record(&self, record: &TraceRecord) -> Result<(), TraceError> {
        let usage = record
            .token_usage
            .map(|u| format!("{}in/{}out", u.input, u.output))
            .unwrap_or_else(|| "-".to_string());
        log::info!(
            "trace run={} node={} status={:?} duration={}ms tokens={}",
            record.run_id,
            record.node_id,
            record.status,
            record.duration.as_millis(),
            usage
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_accepts_record() {
        let sink = LogTraceSink;
        let record = TraceRecord {
            run_id: Uuid::new_v4(),
            node_id: "research".to_string(),
            status: NodeStatus::Succeeded,
            duration: Duration::from_millis(120),
            token_usage: Some(TokenUsage { input: 10, output: 5 }),
            cost: None,
            timestamp: Utc::now(),
        };

        assert!(sink.record(&record).await.is_ok());
    }

    #[test]
    fn test_record_serializes() {
        let record = TraceRecord {
            run_id: Uuid::nil(),
            node_id: "write".to_string(),
            status: NodeStatus::Failed,
            duration: Duration::from_secs(2),
            token_usage: None,
            cost: None,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["node_id"], "write");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["duration"], 2000);
    }
}

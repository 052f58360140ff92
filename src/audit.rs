//! Audit log
//!
//! Appends one JSON line per finished transaction flow (mined, failed or cancelled).
//! Writing never fails the flow; errors are logged and dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry in the audit log
#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub flow_id: String,
    pub action: Option<String>,
    pub chain: Option<String>,
    /// The request as received
    pub intent: Value,
    /// "mined", "cancelled" or "error"
    pub status: &'static str,
    pub tx_hashes: Vec<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// JSONL audit trail of transaction flows
#[derive(Clone)]
pub struct AuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLog {
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter {
                path: log_path.into(),
            })),
        }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_appends_entries() {
        let temp_file = NamedTempFile::new().unwrap();
        let log = AuditLog::new(temp_file.path());

        for status in ["cancelled", "mined"] {
            log.record(AuditEntry {
                timestamp: Utc::now(),
                flow_id: "flow-1".to_string(),
                action: Some("buy".to_string()),
                chain: Some("Base".to_string()),
                intent: json!({"token": "DEGEN"}),
                status,
                tx_hashes: vec![],
                error: None,
                duration_ms: 5,
            })
            .await;
        }

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"status\":\"cancelled\""));
        assert!(lines[1].contains("\"status\":\"mined\""));
        assert!(lines[1].contains("DEGEN"));
    }
}

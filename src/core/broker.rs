use crate::core::error::DmregError;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const AUDIT_LOG_NAME: &str = "broker.events.jsonl";

/// Every registry unit of work passes through the broker, which appends one
/// audit event per call to `broker.events.jsonl` under the store root.
pub struct DbBroker {
    audit_log_path: PathBuf,
    db_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl DbBroker {
    pub fn new(root: &Path, db_id: &str) -> Self {
        Self {
            audit_log_path: root.join(AUDIT_LOG_NAME),
            db_id: db_id.to_string(),
        }
    }

    /// Run `f` and record its outcome. The result of `f` is returned unchanged.
    pub fn audited<F, R>(&self, actor: &str, op_name: &str, f: F) -> Result<R, DmregError>
    where
        F: FnOnce() -> Result<R, DmregError>,
    {
        let result = f();

        let (status, code) = match &result {
            Ok(_) => ("success", None),
            Err(e) => ("error", Some(e.code())),
        };
        if let Err(log_err) = self.log_event(actor, op_name, status, code) {
            // Audit failure never replaces the operation's own result.
            tracing::warn!(op = op_name, error = %log_err, "failed to append audit event");
        }

        result
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        status: &str,
        code: Option<&str>,
    ) -> Result<(), DmregError> {
        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: self.db_id.clone(),
            status: status.to_string(),
            code: code.map(|s| s.to_string()),
        };
        let line = serde_json::to_string(&ev)
            .map_err(|e| DmregError::ValidationError(format!("audit encode: {e}")))?;

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)?;
        writeln!(f, "{}", line)?;
        Ok(())
    }
}

/// Read back the audit log, oldest first. Missing log means no events.
pub fn read_events(root: &Path) -> Result<Vec<BrokerEvent>, DmregError> {
    let path = root.join(AUDIT_LOG_NAME);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l)
                .map_err(|e| DmregError::ValidationError(format!("bad audit line: {e}")))
        })
        .collect()
}

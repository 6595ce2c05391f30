//! Long-running operations.
//!
//! Two shapes exist on the wire:
//!
//! - `google.longrunning.Operation` (Live Stream, Translation, Vision):
//!   `{name, done, error | response, metadata}`, polled at `/{version}/{name}`.
//! - Compute Engine `Operation`: `{name, status, error.errors[], zone | region}`,
//!   polled at the zonal, regional, or global `operations` collection.
//!
//! Waiting is a plain poll loop bounded by the client's `max_polls`.

use crate::client::GcpClient;
use crate::error::{GcpError, GcpResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// `google.rpc.Status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

/// `google.longrunning.Operation`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<Status>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Operation {
    /// Fail if the finished operation carries an error.
    pub fn check(&self, service: &str) -> GcpResult<()> {
        match self.error {
            Some(ref st) => Err(GcpError::from_operation_status(service, st.code, &st.message)),
            None => Ok(()),
        }
    }

    /// Unpack the operation's `response` into the resource it produced.
    pub fn into_response<T: DeserializeOwned>(self, service: &str) -> GcpResult<T> {
        self.check(service)?;
        let response = self.response.ok_or_else(|| {
            GcpError::from_str(service, &format!("operation {} has no response", self.name))
        })?;
        serde_json::from_value(response)
            .map_err(|e| GcpError::from_str(service, &format!("operation response: {}", e)))
    }

    /// Decode the operation metadata.
    pub fn metadata_as<T: DeserializeOwned>(&self, service: &str) -> GcpResult<T> {
        let metadata = self.metadata.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(metadata)
            .map_err(|e| GcpError::from_str(service, &format!("operation metadata: {}", e)))
    }
}

// ── Compute Engine operations ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputeErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputeOperationError {
    #[serde(default)]
    pub errors: Vec<ComputeErrorItem>,
}

/// Compute Engine zonal/regional/global operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputeOperation {
    #[serde(default)]
    pub name: String,
    /// PENDING, RUNNING or DONE.
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "operationType")]
    pub operation_type: Option<String>,
    #[serde(default, rename = "targetLink")]
    pub target_link: Option<String>,
    /// Zone URL for zonal operations.
    #[serde(default)]
    pub zone: Option<String>,
    /// Region URL for regional operations.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub error: Option<ComputeOperationError>,
    #[serde(default, rename = "httpErrorStatusCode")]
    pub http_error_status_code: Option<u16>,
    #[serde(default, rename = "httpErrorMessage")]
    pub http_error_message: Option<String>,
}

impl ComputeOperation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    pub fn check(&self) -> GcpResult<()> {
        let Some(ref err) = self.error else {
            return Ok(());
        };
        let first = err.errors.first();
        let status = first.map(|e| e.code.as_str()).unwrap_or("OPERATION_FAILED");
        let message = err
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Err(GcpError::new(
            "compute",
            self.http_error_status_code.unwrap_or(500),
            status,
            if message.is_empty() { "Operation failed" } else { &message },
        ))
    }

    /// Collection path the operation is polled from.
    pub fn poll_path(&self, project: &str) -> String {
        let scope = match (&self.zone, &self.region) {
            (Some(zone), _) => format!("zones/{}", last_segment(zone)),
            (None, Some(region)) => format!("regions/{}", last_segment(region)),
            (None, None) => "global".to_string(),
        };
        format!(
            "/compute/v1/projects/{}/{}/operations/{}",
            project, scope, self.name
        )
    }
}

fn last_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

// ── Waiting ─────────────────────────────────────────────────────────────

impl GcpClient {
    /// Poll a `google.longrunning.Operation` until it is done.
    ///
    /// Returns the finished operation; an operation that finished with an
    /// error is returned as `Err`.
    pub async fn wait_operation(
        &self,
        service: &str,
        version: &str,
        op: Operation,
    ) -> GcpResult<Operation> {
        let name = service.split('.').next().unwrap_or(service);
        let mut op = op;
        let mut polls = 0u32;

        while !op.done {
            if polls >= self.max_polls {
                return Err(GcpError::new(
                    name,
                    408,
                    "DEADLINE_EXCEEDED",
                    &format!("Operation {} timed out waiting for completion", op.name),
                ));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;
            let path = format!("{}/{}", version, op.name);
            op = self.get(service, &path, &[]).await?;
        }

        if let Some(ref err) = op.error {
            log::warn!("operation {} failed: {}", op.name, err.message);
        } else {
            log::info!("operation {} done after {} polls", op.name, polls);
        }
        op.check(name)?;
        Ok(op)
    }

    /// Poll a Compute Engine operation until its status is `DONE`.
    pub async fn wait_compute_operation(
        &self,
        project: &str,
        op: ComputeOperation,
    ) -> GcpResult<ComputeOperation> {
        let mut op = op;
        let mut polls = 0u32;

        while !op.is_done() {
            if polls >= self.max_polls {
                return Err(GcpError::new(
                    "compute",
                    408,
                    "DEADLINE_EXCEEDED",
                    &format!("Operation {} timed out waiting for completion", op.name),
                ));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;
            op = self.get("compute", &op.poll_path(project), &[]).await?;
        }

        if op.error.is_some() {
            log::warn!("compute operation {} finished with errors", op.name);
        } else {
            log::info!(
                "compute operation {} ({}) done",
                op.name,
                op.operation_type.as_deref().unwrap_or("unknown")
            );
        }
        op.check()?;
        Ok(op)
    }
}

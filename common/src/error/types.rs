use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error detail attached to a failed plug-in operation or RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

/// Standard error envelope shared across plug-ins so every failure surfaced
/// to a caller carries a stable code and a trace id for correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                trace_id: trace_id.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        trace_id: impl Into<String>,
        details: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                trace_id: trace_id.into(),
                details: Some(details),
            },
        }
    }

    #[cfg(feature = "grpc")]
    pub fn to_grpc_status(&self, code: tonic::Code) -> tonic::Status {
        tonic::Status::new(code, &self.error.message)
    }
}

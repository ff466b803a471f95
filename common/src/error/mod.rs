//! Standardized error envelope and trace-id extraction shared across
//! plug-ins so every surfaced failure carries a stable code and a
//! correlation id.

mod trace;
mod types;

pub use trace::generate_trace_id;
pub use types::{ErrorDetail, ErrorResponse};

#[cfg(feature = "grpc")]
pub use trace::extract_trace_id_from_grpc;

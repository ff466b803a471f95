use uuid::Uuid;

/// Extract a correlation id from gRPC metadata, preferring the W3C
/// `traceparent` header, falling back to `x-trace-id`, and generating a
/// fresh one when neither is present.
#[cfg(feature = "grpc")]
pub fn extract_trace_id_from_grpc<T>(request: &tonic::Request<T>) -> String {
    let metadata = request.metadata();

    if let Some(traceparent) = metadata.get("traceparent") {
        if let Ok(traceparent_str) = traceparent.to_str() {
            if let Some(trace_id) = parse_traceparent(traceparent_str) {
                return trace_id;
            }
        }
    }

    if let Some(trace_id) = metadata.get("x-trace-id") {
        if let Ok(trace_id_str) = trace_id.to_str() {
            return trace_id_str.to_string();
        }
    }

    generate_trace_id()
}

/// Parse a W3C traceparent header (`version-trace_id-span_id-flags`).
fn parse_traceparent(traceparent: &str) -> Option<String> {
    let parts: Vec<&str> = traceparent.split('-').collect();
    if parts.len() != 4 || parts[0] != "00" {
        return None;
    }
    Some(parts[1].to_string())
}

pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

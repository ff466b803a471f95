use std::time::Duration;

/// W3C trace context, used to correlate a gRPC call across the client and
/// service plug-ins.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: Option<String>,
    pub trace_flags: Option<String>,
}

impl TraceContext {
    pub fn new_root() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            span_id: None,
            trace_flags: Some("01".to_string()),
        }
    }

    pub fn to_traceparent(&self) -> String {
        let span_id = self.span_id.as_deref().unwrap_or("0000000000000000");
        let flags = self.trace_flags.as_deref().unwrap_or("01");
        format!("00-{}-{}-{}", self.trace_id, span_id, flags)
    }
}

/// Parse a W3C `traceparent` header (`version-trace_id-span_id-flags`).
pub fn parse_traceparent(traceparent: &str) -> Option<TraceContext> {
    let parts: Vec<&str> = traceparent.split('-').collect();
    if parts.len() != 4 || parts[0] != "00" {
        return None;
    }

    Some(TraceContext {
        trace_id: parts[1].to_string(),
        span_id: Some(parts[2].to_string()),
        trace_flags: Some(parts[3].to_string()),
    })
}

/// Format an elapsed duration with the adaptive unit the application
/// bootstrap uses when reporting startup time: milliseconds under a
/// second, seconds under a minute, minutes otherwise.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1_000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{:.2}m", elapsed.as_secs_f64() / 60.0)
    }
}

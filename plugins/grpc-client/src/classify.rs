use tonic::Code;

/// gRPC status codes that do not indicate a fault in the called service —
/// the caller asked for something invalid, or something that legitimately
/// doesn't exist, rather than the service failing to do its job. These
/// never count against a service's circuit breaker.
const BREAKER_NON_FAILURE_CODES: &[Code] = &[
    Code::Ok,
    Code::Cancelled,
    Code::InvalidArgument,
    Code::NotFound,
    Code::AlreadyExists,
    Code::PermissionDenied,
    Code::Unauthenticated,
    Code::FailedPrecondition,
    Code::OutOfRange,
    Code::Unimplemented,
];

/// gRPC status codes worth retrying: transient or capacity-related faults.
const RETRYABLE_CODES: &[Code] = &[
    Code::Unavailable,
    Code::DeadlineExceeded,
    Code::ResourceExhausted,
    Code::Aborted,
    Code::OutOfRange,
    Code::Internal,
    Code::DataLoss,
];

/// Whether `code` should count as a failure against the per-service
/// circuit breaker. The caller is responsible for also treating local
/// cancellation (the caller's own context being cancelled or timing out,
/// as opposed to a `DeadlineExceeded` status returned by the server) as a
/// non-failure — that distinction lives above the gRPC status entirely.
pub fn is_breaker_failure(code: Code) -> bool {
    !BREAKER_NON_FAILURE_CODES.contains(&code)
}

/// Whether a failed call with this status code is worth retrying.
pub fn is_retryable(code: Code) -> bool {
    RETRYABLE_CODES.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_is_not_a_breaker_failure() {
        assert!(!is_breaker_failure(Code::InvalidArgument));
    }

    #[test]
    fn unavailable_is_a_breaker_failure() {
        assert!(is_breaker_failure(Code::Unavailable));
    }

    #[test]
    fn unavailable_is_retryable() {
        assert!(is_retryable(Code::Unavailable));
    }

    #[test]
    fn permission_denied_is_not_retryable() {
        assert!(!is_retryable(Code::PermissionDenied));
    }

    #[test]
    fn out_of_range_is_both_non_failure_and_retryable() {
        assert!(!is_breaker_failure(Code::OutOfRange));
        assert!(is_retryable(Code::OutOfRange));
    }
}

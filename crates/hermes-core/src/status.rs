//! HTTP status reason phrases used in the response envelope.
//!
//! The envelope's `status.message` field is drawn from this table rather than
//! from `http::StatusCode::canonical_reason`, because the wire format uses
//! upper snake case names (`BAD_REQUEST`, `MOVED_TEMPORARILY`, ...) and
//! includes a few non-standard codes integrators already depend on.

/// Message used for codes missing from the table.
pub const UNKNOWN_STATUS: &str = "UNKNOWN_STATUS";

/// Returns the envelope reason phrase for a status code.
///
/// # Example
///
/// ```
/// use hermes_core::status::reason_phrase;
///
/// assert_eq!(reason_phrase(200), "OK");
/// assert_eq!(reason_phrase(401), "UNAUTHORIZED");
/// assert_eq!(reason_phrase(599), "UNKNOWN_STATUS");
/// ```
#[must_use]
pub const fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "CONTINUE",
        101 => "SWITCHING_PROTOCOLS",
        102 => "PROCESSING",
        200 => "OK",
        201 => "CREATED",
        202 => "ACCEPTED",
        203 => "NON_AUTHORITATIVE_INFORMATION",
        204 => "NO_CONTENT",
        205 => "RESET_CONTENT",
        206 => "PARTIAL_CONTENT",
        207 => "MULTI_STATUS",
        300 => "MULTIPLE_CHOICES",
        301 => "MOVED_PERMANENTLY",
        302 => "MOVED_TEMPORARILY",
        303 => "SEE_OTHER",
        304 => "NOT_MODIFIED",
        305 => "USE_PROXY",
        307 => "TEMPORARY_REDIRECT",
        308 => "PERMANENT_REDIRECT",
        400 => "BAD_REQUEST",
        401 => "UNAUTHORIZED",
        402 => "PAYMENT_REQUIRED",
        403 => "FORBIDDEN",
        404 => "NOT_FOUND",
        405 => "METHOD_NOT_ALLOWED",
        406 => "NOT_ACCEPTABLE",
        407 => "PROXY_AUTHENTICATION_REQUIRED",
        408 => "REQUEST_TIMEOUT",
        409 => "CONFLICT",
        410 => "GONE",
        411 => "LENGTH_REQUIRED",
        412 => "PRECONDITION_FAILED",
        413 => "REQUEST_TOO_LONG",
        414 => "REQUEST_URI_TOO_LONG",
        415 => "UNSUPPORTED_MEDIA_TYPE",
        416 => "REQUESTED_RANGE_NOT_SATISFIABLE",
        417 => "EXPECTATION_FAILED",
        418 => "IM_A_TEAPOT",
        419 => "INSUFFICIENT_SPACE_ON_RESOURCE",
        420 => "METHOD_FAILURE",
        421 => "MISDIRECTED_REQUEST",
        422 => "UNPROCESSABLE_ENTITY",
        423 => "LOCKED",
        424 => "FAILED_DEPENDENCY",
        428 => "PRECONDITION_REQUIRED",
        429 => "TOO_MANY_REQUESTS",
        431 => "REQUEST_HEADER_FIELDS_TOO_LARGE",
        451 => "UNAVAILABLE_FOR_LEGAL_REASONS",
        500 => "INTERNAL_SERVER_ERROR",
        501 => "NOT_IMPLEMENTED",
        502 => "BAD_GATEWAY",
        503 => "SERVICE_UNAVAILABLE",
        504 => "GATEWAY_TIMEOUT",
        505 => "HTTP_VERSION_NOT_SUPPORTED",
        507 => "INSUFFICIENT_STORAGE",
        511 => "NETWORK_AUTHENTICATION_REQUIRED",
        _ => UNKNOWN_STATUS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_common_gateway_codes() {
        assert_eq!(reason_phrase(400), "BAD_REQUEST");
        assert_eq!(reason_phrase(404), "NOT_FOUND");
        assert_eq!(reason_phrase(429), "TOO_MANY_REQUESTS");
        assert_eq!(reason_phrase(500), "INTERNAL_SERVER_ERROR");
        assert_eq!(reason_phrase(504), "GATEWAY_TIMEOUT");
    }

    #[test]
    fn test_non_standard_names() {
        assert_eq!(reason_phrase(302), "MOVED_TEMPORARILY");
        assert_eq!(reason_phrase(413), "REQUEST_TOO_LONG");
        assert_eq!(reason_phrase(418), "IM_A_TEAPOT");
        assert_eq!(reason_phrase(419), "INSUFFICIENT_SPACE_ON_RESOURCE");
        assert_eq!(reason_phrase(420), "METHOD_FAILURE");
    }

    #[test]
    fn test_gaps_are_unknown() {
        assert_eq!(reason_phrase(306), UNKNOWN_STATUS);
        assert_eq!(reason_phrase(506), UNKNOWN_STATUS);
    }

    proptest! {
        #[test]
        fn phrases_are_upper_snake_case(code in 100u16..600) {
            let phrase = reason_phrase(code);
            prop_assert!(!phrase.is_empty());
            prop_assert!(phrase.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }
}

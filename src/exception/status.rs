use super::HttpError;

macro_rules! error_kinds {
    ($($variant:ident, $ctor:ident => $code:literal, $reason:literal;)*) => {
        /// Named 4xx and 5xx errors, one per registered status.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            strum_macros::Display,
            strum_macros::EnumIter,
            strum_macros::IntoStaticStr,
        )]
        pub enum ErrorKind {
            $($variant,)*
        }

        impl ErrorKind {
            pub fn status(self) -> u16 {
                match self {
                    $(ErrorKind::$variant => $code,)*
                }
            }

            pub fn reason(self) -> &'static str {
                match self {
                    $(ErrorKind::$variant => $reason,)*
                }
            }

            pub fn from_status(status: u16) -> Option<Self> {
                match status {
                    $($code => Some(ErrorKind::$variant),)*
                    _ => None,
                }
            }
        }

        impl HttpError {
            $(
                #[doc = concat!("`", stringify!($code), " ", $reason, "`")]
                pub fn $ctor() -> Self {
                    HttpError::new(ErrorKind::$variant)
                }
            )*
        }
    };
}

error_kinds! {
    BadRequest, bad_request => 400, "Bad Request";
    Unauthorized, unauthorized => 401, "Unauthorized";
    PaymentRequired, payment_required => 402, "Payment Required";
    Forbidden, forbidden => 403, "Forbidden";
    NotFound, not_found => 404, "Not Found";
    MethodNotAllowed, method_not_allowed => 405, "Method Not Allowed";
    NotAcceptable, not_acceptable => 406, "Not Acceptable";
    ProxyAuthenticationRequired, proxy_authentication_required => 407, "Proxy Authentication Required";
    RequestTimeout, request_timeout => 408, "Request Timeout";
    Conflict, conflict => 409, "Conflict";
    Gone, gone => 410, "Gone";
    LengthRequired, length_required => 411, "Length Required";
    PreconditionFailed, precondition_failed => 412, "Precondition Failed";
    RequestEntityTooLarge, request_entity_too_large => 413, "Request Entity Too Large";
    RequestUriTooLarge, request_uri_too_large => 414, "Request-URI Too Large";
    UnsupportedMediaType, unsupported_media_type => 415, "Unsupported Media Type";
    RequestedRangeNotSatisfiable, requested_range_not_satisfiable => 416, "Requested Range Not Satisfiable";
    ExpectationFailed, expectation_failed => 417, "Expectation Failed";
    UnprocessableEntity, unprocessable_entity => 422, "Unprocessable Entity";
    Locked, locked => 423, "Locked";
    FailedDependency, failed_dependency => 424, "Failed Dependency";
    UnorderedCollection, unordered_collection => 425, "Unordered Collection";
    UpgradeRequired, upgrade_required => 426, "Upgrade Required";
    PreconditionRequired, precondition_required => 428, "Precondition Required";
    TooManyRequests, too_many_requests => 429, "Too Many Requests";
    RequestHeaderFieldsTooLarge, request_header_fields_too_large => 431, "Request Header Fields Too Large";
    RetryWith, retry_with => 449, "Retry With";
    UnavailableForLegalReasons, unavailable_for_legal_reasons => 451, "Unavailable For Legal Reasons";
    InternalServerError, internal_server_error => 500, "Internal Server Error";
    NotImplemented, not_implemented => 501, "Not Implemented";
    BadGateway, bad_gateway => 502, "Bad Gateway";
    ServiceUnavailable, service_unavailable => 503, "Service Unavailable";
    GatewayTimeout, gateway_timeout => 504, "Gateway Timeout";
    HttpVersionNotSupported, http_version_not_supported => 505, "HTTP Version Not Supported";
    VariantAlsoNegotiates, variant_also_negotiates => 506, "Variant Also Negotiates";
    InsufficientStorage, insufficient_storage => 507, "Insufficient Storage";
    LoopDetected, loop_detected => 508, "Loop Detected";
    BandwidthLimitExceeded, bandwidth_limit_exceeded => 509, "Bandwidth Limit Exceeded";
    NotExtended, not_extended => 510, "Not Extended";
    NetworkAuthenticationRequired, network_authentication_required => 511, "Network Authentication Required";
}

/// Reason phrase of any registered status, 1xx to 5xx.
pub fn reason_phrase(status: u16) -> Option<&'static str> {
    if let Some(kind) = ErrorKind::from_status(status) {
        return Some(kind.reason());
    }

    let reason = match status {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        _ => return None,
    };
    Some(reason)
}

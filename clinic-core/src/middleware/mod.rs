pub mod metrics;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use metrics::metrics_middleware;
pub use rate_limit::{IpRateLimiter, create_ip_rate_limiter, ip_rate_limit_middleware};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;

//! Cross-cutting HTTP middleware
//!
//! Authentication and role checks live in [`crate::auth::middleware`].
//!
//! Author: hephaex@gmail.com

pub mod errors;
pub mod locale;
pub mod request_id;
pub mod security_headers;

pub use errors::normalize_errors;
pub use locale::locale_middleware;
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use security_headers::security_headers_middleware;

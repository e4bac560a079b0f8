pub mod api_key;
pub mod context;
pub mod rate_limit;

pub use api_key::require_api_key;
pub use context::{extract_client, extract_credentials};
pub use rate_limit::throttle;

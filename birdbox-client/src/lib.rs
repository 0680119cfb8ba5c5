pub mod client;
pub mod query;

pub use client::{ApiClient, ClientError, DEFAULT_API_TOKEN, LoadResponse};
pub use query::{Filter, FilterOperator, Query};

pub mod fetcher;
pub mod rate_limiter;
pub mod scheduler;
pub mod source;

//! Request guards applied in front of the API routes.

pub mod rate_limit;

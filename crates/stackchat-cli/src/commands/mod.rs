pub mod check;
pub mod deploy;
pub mod metrics;
pub mod models;
pub mod setup;
pub mod utils;

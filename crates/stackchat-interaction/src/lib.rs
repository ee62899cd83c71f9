//! HTTP access to the GPUStack serving API.

pub mod backend_client;

pub use backend_client::BackendClient;

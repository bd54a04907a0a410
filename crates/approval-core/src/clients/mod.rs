//! Clients for the back-office services

pub mod maharat;

pub use maharat::MaharatApiClient;

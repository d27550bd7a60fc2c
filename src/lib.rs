//! Drip Engine — automated SMS nurture for real-estate sales leads.

pub mod config;
pub mod error;
pub mod http;
pub mod intent;
pub mod nurture;
pub mod phone;
pub mod store;
pub mod transport;

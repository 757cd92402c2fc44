//! Custody of unsigned transactions between preparation and submission.
//!
//! The bridge never needs a caller's private key: transactions are either
//! signed with the server's own key, or parked in memory until an external
//! signer sends back a signature for them.

pub mod clock;
pub mod error;
pub mod mode;
pub mod reaper;
pub mod service;
pub mod store;

pub use self::{
    error::CustodyError,
    mode::SigningMode,
    service::{ServiceConfig, SigningService},
    store::TransactionId,
};

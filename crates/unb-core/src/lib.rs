//! Core domain + application logic for the useNear Telegram bot.
//!
//! This crate is framework-agnostic. Telegram, the NEAR RPC node, NFT.Storage and
//! Mintbase live behind ports (traits) implemented in adapter crates.

pub mod amount;
pub mod commands;
pub mod config;
pub mod continuation;
pub mod contracts;
pub mod credentials;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod groups;
pub mod logging;
pub mod membership;
pub mod messaging;
pub mod ports;
pub mod proposals;
pub mod session;

mod callbacks;

#[cfg(test)]
mod testkit;

pub use errors::{Error, Result};

//! Core types and trait definitions for the closerhub marketplace.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The directory query builder, the subscription state machine and the
//! role gate live here as plain functions over plain data; storage backends
//! implement [`store::MarketStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod account;
pub mod directory;
pub mod error;
pub mod normalize;
pub mod offer;
pub mod session;
pub mod store;
pub mod subscription;

pub use error::{Error, Result};

//! # embed-service
//!
//! Runs the embedding service over an in-memory compositor and drives
//! a host session against it: a remote view is attached and grafted
//! into a host window, a drawn child or a display mirror is attached
//! under a second host window, and everything is torn down in order.

pub mod config;
pub mod service;

//! # Warren Support
//!
//! Shared helpers for the Warren DI crates.
//!
//! This crate provides:
//! - Text rendering for scope chains and type names in error messages
//! - "Did you mean?" suggestions for misspelled dependency names

pub mod rendering;

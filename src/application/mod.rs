//! Application layer orchestrating contract enforcement.
//!
//! This module defines the `EnforcementEngine`, the entry point for opening
//! contracts and evaluating them against a user's transactions. Mutual
//! exclusion between overlapping evaluations of one contract lives in `locks`.

pub mod engine;
pub mod locks;

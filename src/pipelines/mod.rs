//! Render pipeline construction.

pub mod basic;

//! Venue and data adapters

pub mod advisory;
pub mod feed;
pub mod paper;

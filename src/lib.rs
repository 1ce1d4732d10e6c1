#![forbid(unsafe_code)]

//! Local catalog of out-of-context video claims and their fact-check
//! references.

pub mod config;
pub mod factcheck;
pub mod flash;
pub mod inspector;
pub mod logging;
pub mod page;
pub mod platform;
pub mod records;
pub mod security;

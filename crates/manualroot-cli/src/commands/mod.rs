//! CLI command handlers

pub mod brand;
pub mod chat;
pub mod history;
pub mod index;
pub mod search;
pub mod status;

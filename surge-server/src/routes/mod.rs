//! HTTP route handlers

pub mod pieces;
pub mod status;
pub mod ws;

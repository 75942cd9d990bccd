//! Library crate for loopy-back, exposing modules for the binary and tests.

pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod games;
pub mod routes;
pub mod services;
pub mod state;

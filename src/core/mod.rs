//! Configuration and domain models shared by the pipeline

pub mod config;
pub mod models;

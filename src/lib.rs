//! bootctl - A/B boot slot control with a crash-safe metadata store

pub mod boot;
pub mod cli;
pub mod config;
pub mod crash_point;
pub mod metadata;
pub mod observability;
pub mod service;
pub mod slot;

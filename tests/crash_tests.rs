//! Crash tests for bootctl
//!
//! - Real binary, real filesystem
//! - Scenarios live in crash/scenarios/*

mod crash;

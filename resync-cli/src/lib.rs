//! ABOUTME: Command-line interface library for the Resync composition root
//! ABOUTME: CLI argument parsing, command handling, and startup wiring

pub mod cli;
pub mod commands;
pub mod providers;
pub mod wiring;

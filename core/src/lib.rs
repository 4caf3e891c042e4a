//! Shared building blocks for the Slide MCP server: process configuration,
//! tools-mode admission rules and the typed REST models.

pub mod config;
pub mod error;
pub mod models;
pub mod policy;

pub use config::{ServerConfig, ToolsMode};

pub mod commands;

pub use commands::{BoardCommand, Cli, Commands, MarketCommand};

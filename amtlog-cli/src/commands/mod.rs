//! Command handlers -- one module per subcommand

pub mod config;
pub mod ledger;
pub mod parse;
pub mod rules;

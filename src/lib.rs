//! Credit card list state for a bookkeeping app: selection, filtering,
//! incremental reveal and the controller that ties them to a card backend.

pub mod backend;
pub mod cli;
pub mod controller;
pub mod db;
pub mod error;
pub mod filter;
pub mod fmt;
pub mod logging;
pub mod models;
pub mod selection;
pub mod settings;
pub mod store;
pub mod tui;
pub mod undo;
pub mod window;

//! Utilities shared by the library and the command line tool

pub mod logging;

pub use logging::init_logging;

pub mod addressbook;
pub mod config;
pub mod converter;
pub mod logger;
pub mod rewrite;
pub mod splice;
pub mod utils;

pub use converter::Converter;

pub mod config;
pub mod economics;
pub mod errors;
pub mod interfaces;
pub mod modules;
pub mod sharding;
pub mod types;

pub(crate) const LOGGER_MSG: &str = "search_indexer";

pub type Result<T> = std::result::Result<T, errors::Error>;

// The attachment protocol recognizes a successful execution by the return
// code the VM appends to the result payload: "@6f6b" is hex("ok").
pub(crate) const OK_HEX_ENCODED: &str = "6f6b";
pub(crate) const AT_SEPARATOR: char = '@';

pub mod actor;
pub mod currency;
pub mod error;
pub mod source;

pub mod expense;
pub mod payable;
pub mod payment;

pub mod aggregate;
pub mod contract;
pub mod lifecycle;
pub mod organization;
pub mod payment;
pub mod ports;
pub mod transaction;

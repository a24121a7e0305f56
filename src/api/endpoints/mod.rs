pub mod certificates;
pub mod compliance;
pub mod health;
pub mod transports;

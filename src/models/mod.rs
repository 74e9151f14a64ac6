pub mod driver;
pub mod reservation;
pub mod service;

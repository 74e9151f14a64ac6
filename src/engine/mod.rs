pub mod matching;
pub mod pricing;
pub mod reservation;

pub mod executor;
pub mod stages;
pub mod strategy;

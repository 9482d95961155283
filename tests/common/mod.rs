#![allow(dead_code)]

pub mod recording;
pub mod strategies;

pub use fixtures::*;
pub use recording::*;

// Core encoding engine

pub mod batch;
pub mod core;
pub mod error;
pub mod hardware;
pub mod probe;
pub mod worker;

pub use core::*;
pub use error::EngineError;

#![allow(dead_code)]

pub mod builders;
pub mod mock_transport;
pub mod strategies;

pub use builders::*;
pub use mock_transport::*;
pub use strategies::*;

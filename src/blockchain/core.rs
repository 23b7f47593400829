// core.rs splits block format, wire codec, chain storage and validation into submodules.
pub mod block;
pub mod chain;
pub mod codec;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use codec::*;
pub use validation::*;

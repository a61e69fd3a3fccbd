pub mod executor;
pub mod process;

pub use executor::LockfileRunner;

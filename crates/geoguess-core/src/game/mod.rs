pub mod outcome;
pub mod serialization;
pub mod session;

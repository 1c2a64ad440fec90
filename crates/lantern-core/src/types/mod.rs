pub mod beacon;
pub mod execution;

pub mod merge;
pub mod sandbox;

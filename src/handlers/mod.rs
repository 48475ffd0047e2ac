pub mod health;
pub mod offset;
pub mod status;

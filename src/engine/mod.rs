pub mod deploy;
pub mod verify;
pub mod workflow;

pub mod appointments;
pub mod auth;
pub mod billing;
pub mod manage;
pub mod portal;
pub mod public_booking;
pub mod subscription;

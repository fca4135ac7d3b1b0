pub mod appointment;
pub mod auth;
pub mod availability;
pub mod establishment;
pub mod portal;
pub mod subscription;

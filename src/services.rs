pub mod appointment_service;
pub mod auth;
pub mod availability_service;
pub mod billing_service;
pub mod notifier;
pub mod portal_service;
pub mod quota_service;
pub mod token_service;

pub mod user_repo;
pub use user_repo::UserRepository;
pub mod establishment_repo;
pub use establishment_repo::EstablishmentRepository;
pub mod appointment_repo;
pub use appointment_repo::AppointmentRepository;
pub mod token_repo;
pub use token_repo::TokenRepository;
pub mod subscription_repo;
pub use subscription_repo::SubscriptionRepository;

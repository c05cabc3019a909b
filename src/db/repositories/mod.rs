pub mod json_repository;
pub mod user_repository;

pub use json_repository::JsonUserRepository;
pub use user_repository::{InMemoryUserRepository, UserRepository};

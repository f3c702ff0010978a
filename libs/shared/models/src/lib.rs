pub mod audit;
pub mod auth;
pub mod clock;
pub mod entities;
pub mod error;

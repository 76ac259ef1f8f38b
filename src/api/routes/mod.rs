pub mod aggregate;
pub mod health;

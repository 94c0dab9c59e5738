pub mod health;
pub mod incidents;
pub mod services;
pub mod stats;
pub mod status;

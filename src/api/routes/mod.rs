pub mod health;
pub mod hosts;
pub mod monitoring;
pub mod settings;

pub mod api_router;
pub mod config;
pub mod cycles;
pub mod directory;
pub mod evaluations;
pub mod matrices;
pub mod notifications;
pub mod reports;
pub mod security;
pub mod shared;

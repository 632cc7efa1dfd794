//! Concrete dialogue flows and commands built on the services

pub mod commands;
pub mod onboarding;

pub use commands::register_default_commands;
pub use onboarding::{onboarding_flow, OnboardingSettings};

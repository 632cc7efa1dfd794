//! helpbot - scripted onboarding dialogue and slash commands for vinebot conversations

pub mod domain;
pub mod application;
pub mod infrastructure;

//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: Dialogue engine, slash command registry, outbound messenger
//! - Messaging: Inbound message parsing and routing
//! - Flows: The onboarding dialogue and default commands
//! - Errors: Domain-specific errors

pub mod errors;
pub mod services;
pub mod messaging;
pub mod flows;

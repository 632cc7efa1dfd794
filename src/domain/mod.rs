//! Domain layer - Core business objects and collaborator seams
//!
//! This layer contains:
//! - Entities: Users, conversations, messages, slash command descriptors
//! - Traits: Abstractions for the record stores and the transport

pub mod entities;
pub mod traits;

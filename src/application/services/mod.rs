//! Application services - Business logic orchestration

pub mod command_service;
pub mod dialogue_service;
pub mod messenger;

pub use command_service::CommandService;
pub use dialogue_service::{StageGraph, StageHandler, Transition};
pub use messenger::Messenger;

//! Message handling - Inbound message parsing and routing

pub mod parser;
pub mod router;

pub use parser::{Annotation, BodyKind, MessageParser};
pub use router::{MessageRouter, RouterSettings, IDLE_ACTION};

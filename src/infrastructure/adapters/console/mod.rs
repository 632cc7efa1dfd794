//! Console adapter for development/testing
//!
//! Each input line is `<from-address> <body>`, for example
//! `abc123@vine.dashdash.example [alice] yes`.

use async_trait::async_trait;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::application::errors::BotError;
use crate::domain::entities::{Address, InboundMessage};
use crate::domain::traits::{BotInfo, Outbox, Transport};

/// Console transport for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleAdapter {
    pub fn new(bot_name: impl Into<String>, domain: impl Into<String>) -> Self {
        let name = bot_name.into();
        Self {
            info: BotInfo {
                address: Address::new(name.clone(), domain),
                name,
            },
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    pub fn parse_line(line: &str) -> Option<InboundMessage> {
        let (from, body) = line.trim().split_once(' ')?;
        let from = Address::parse(from)?;
        Some(InboundMessage::chat(from, body))
    }
}

#[async_trait]
impl Transport for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console transport as {} (dev mode)", self.info.address);
        println!("Type `<from-address> <body>` per line, Ctrl-D to quit.");
        Ok(())
    }

    async fn recv(&self) -> Option<InboundMessage> {
        let mut lines = self.lines.lock().await;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_line(&line) {
                Some(msg) => return Some(msg),
                None => tracing::warn!("Expected `<from-address> <body>`, got: {}", line),
            }
        }
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

impl Outbox for ConsoleAdapter {
    fn send_chat(&self, to: &Address, body: &str) -> Result<(), BotError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "[{}] {}", to, body)
            .and_then(|_| stdout.flush())
            .map_err(|e| BotError::Transport(format!("Failed to write to stdout: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let msg = ConsoleAdapter::parse_line("abc@vine.example [alice] yes please").unwrap();
        assert_eq!(msg.from.user, "abc");
        assert_eq!(msg.body, "[alice] yes please");

        assert!(ConsoleAdapter::parse_line("no-address-here").is_none());
        assert!(ConsoleAdapter::parse_line("nodomain hello").is_none());
    }
}

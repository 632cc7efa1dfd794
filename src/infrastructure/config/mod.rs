//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::errors::ConfigError;
use crate::application::flows::OnboardingSettings;
use crate::application::messaging::{MessageParser, RouterSettings};
use crate::domain::entities::Address;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub routing: RoutingConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    /// The bot's own user name
    pub name: String,
    pub product_name: String,
    pub domain: String,
    pub support_contact: String,
    pub echo_user: String,
    /// Users allowed to run admin-only commands
    #[serde(default)]
    pub admins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoutingConfig {
    pub leaves_domain: String,
    pub control_address: String,
    pub control_prefixes: Vec<String>,
    pub act_on_user_marker: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "helpbot".to_string(),
                product_name: "Dashdash".to_string(),
                domain: "dashdash.example".to_string(),
                support_contact: "lehrblogger".to_string(),
                echo_user: "echo_user".to_string(),
                admins: vec!["lehrblogger".to_string()],
            },
            routing: RoutingConfig {
                leaves_domain: "vine.dashdash.example".to_string(),
                control_address: "leaves@vine.dashdash.example".to_string(),
                control_prefixes: vec!["*** ".to_string(), "/** ".to_string()],
                act_on_user_marker: "_act_on_user_stage".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from("helpbot.db"),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(name) = std::env::var("HELPBOT_NAME") {
            config.bot.name = name;
        }

        if let Ok(path) = std::env::var("HELPBOT_DATABASE") {
            config.database.path = PathBuf::from(path);
        }

        if let Ok(address) = std::env::var("HELPBOT_CONTROL_ADDRESS") {
            config.routing.control_address = address;
        }

        config
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.name.is_empty() {
            return Err(ConfigError::MissingField("bot.name".to_string()));
        }
        if self.routing.control_prefixes.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidValue(
                "routing.control-prefixes may not contain an empty prefix".to_string(),
            ));
        }
        if self.routing.act_on_user_marker.is_empty() {
            return Err(ConfigError::MissingField("routing.act-on-user-marker".to_string()));
        }
        self.control_address()?;
        Ok(())
    }

    pub fn control_address(&self) -> Result<Address, ConfigError> {
        Address::parse(&self.routing.control_address).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "routing.control-address is not user@domain: {}",
                self.routing.control_address
            ))
        })
    }

    pub fn onboarding_settings(&self) -> OnboardingSettings {
        OnboardingSettings {
            product_name: self.bot.product_name.clone(),
            domain: self.bot.domain.clone(),
            support_contact: self.bot.support_contact.clone(),
            echo_user: self.bot.echo_user.clone(),
        }
    }

    pub fn router_settings(&self) -> Result<RouterSettings, ConfigError> {
        let onboarding = self.onboarding_settings();
        Ok(RouterSettings {
            bot_name: self.bot.name.clone(),
            echo_user: self.bot.echo_user.clone(),
            leaves_domain: self.routing.leaves_domain.clone(),
            control_address: self.control_address()?,
            final_message: onboarding.final_message(),
            apology: onboarding.apology(),
        })
    }

    pub fn message_parser(&self) -> MessageParser {
        MessageParser::new(
            self.routing.control_prefixes.clone(),
            self.routing.act_on_user_marker.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(config.bot.name, "helpbot");
        assert_eq!(config.routing.control_prefixes, vec!["*** ", "/** "]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kebab_case_keys() {
        let yaml = r#"
bot:
  name: helper
  product-name: Vine
  domain: vine.example
  support-contact: ops
  echo-user: echo
routing:
  leaves-domain: leaves.vine.example
  control-address: leaves@leaves.vine.example
  control-prefixes: ["*** "]
  act-on-user-marker: "!stage"
database:
  path: /tmp/helper.db
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert!(config.bot.admins.is_empty());
        let settings = config.router_settings().unwrap();
        assert_eq!(settings.bot_name, "helper");
        assert_eq!(settings.control_address.user, "leaves");
        assert!(settings.final_message.ends_with("ping @ops with questions!"));
    }

    #[test]
    fn test_bad_control_address_is_rejected() {
        let mut config = Config::default();
        config.routing.control_address = "leaves".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }
}

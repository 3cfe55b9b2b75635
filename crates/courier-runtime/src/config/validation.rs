//! Configuration validation.

use std::net::SocketAddr;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BackoffConfig, BotConfig, CourierConfig, LogOutput, LoggingConfig, PollingConfig,
    UpdaterMode, WebhookConfig,
};

/// Validates the entire configuration.
///
/// An empty token is accepted here; the runtime rejects it only when it has
/// to build the HTTP client itself.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_bot(&config.bot)?;
    validate_polling(&config.updater.polling)?;
    if config.updater.mode == UpdaterMode::Webhook {
        validate_webhook(&config.updater.webhook)?;
    }
    if config.conversation.max_entries == 0 {
        return Err(ConfigError::validation(
            "conversation.max_entries must be greater than 0",
        ));
    }
    validate_logging(&config.logging)
}

fn validate_bot(bot: &BotConfig) -> ConfigResult<()> {
    if !bot.token.is_empty() {
        let valid = bot
            .token
            .split_once(':')
            .is_some_and(|(id, secret)| id.parse::<u64>().is_ok() && !secret.is_empty());
        if !valid {
            return Err(ConfigError::validation(
                "bot.token must look like <numeric id>:<secret>",
            ));
        }
    }
    validate_http_url(&bot.api_url)?;
    if bot.request_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "bot.request_timeout_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_polling(polling: &PollingConfig) -> ConfigResult<()> {
    if !(1..=100).contains(&polling.limit) {
        return Err(ConfigError::validation(format!(
            "updater.polling.limit must be between 1 and 100, got {}",
            polling.limit
        )));
    }
    validate_backoff(&polling.backoff)
}

fn validate_backoff(backoff: &BackoffConfig) -> ConfigResult<()> {
    if backoff.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial backoff delay must be greater than 0",
        ));
    }
    if backoff.max_delay_ms < backoff.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max backoff delay must be greater than or equal to the initial delay",
        ));
    }
    if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }
    Ok(())
}

fn validate_webhook(webhook: &WebhookConfig) -> ConfigResult<()> {
    if webhook.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::validation(format!(
            "updater.webhook.listen is not a socket address: {}",
            webhook.listen
        )));
    }
    if !webhook.path.starts_with('/') {
        return Err(ConfigError::validation(
            "updater.webhook.path must start with '/'",
        ));
    }
    if let Some(url) = &webhook.public_url
        && !url.starts_with("https://")
    {
        return Err(ConfigError::invalid_url(url, "webhook URLs must use https"));
    }
    if let Some(secret) = &webhook.secret_token {
        // Platform rule: 1-256 characters from A-Z, a-z, 0-9, _ and -.
        let valid = (1..=256).contains(&secret.len())
            && secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigError::validation(
                "updater.webhook.secret_token must be 1-256 characters of [A-Za-z0-9_-]",
            ));
        }
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_http_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("bot.api_url"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::invalid_url(
            url,
            "URL must start with http:// or https://",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_token_shape() {
        let mut config = CourierConfig::default();
        config.bot.token = "123456:ABC-def".into();
        assert!(validate_config(&config).is_ok());
        config.bot.token = "not-a-token".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_polling_limits() {
        let mut config = CourierConfig::default();
        config.updater.polling.limit = 0;
        assert!(validate_config(&config).is_err());

        let mut config = CourierConfig::default();
        config.updater.polling.backoff.max_delay_ms = 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_webhook_checked_only_in_webhook_mode() {
        let mut config = CourierConfig::default();
        config.updater.webhook.path = "hook".into();
        assert!(validate_config(&config).is_ok());

        config.updater.mode = UpdaterMode::Webhook;
        assert!(validate_config(&config).is_err());

        config.updater.webhook.path = "/hook".into();
        config.updater.webhook.public_url = Some("http://example.com/hook".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        config.updater.webhook.public_url = Some("https://example.com/hook".into());
        config.updater.webhook.secret_token = Some("has space".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}

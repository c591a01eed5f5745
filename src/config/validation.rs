use crate::config::types::{AuditConfig, ClientEntry, Config, FetcherConfig, JobConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_audit_config(&config.audit)?;
    validate_job_config(&config.job)?;
    validate_output_config(&config.output)?;
    validate_clients(&config.clients)?;
    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one entry".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain empty strings".to_string(),
        ));
    }

    for (name, value) in [
        ("discovery_timeout_secs", config.discovery_timeout_secs),
        ("analysis_timeout_secs", config.analysis_timeout_secs),
    ] {
        if !(1..=120).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and 120, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates audit pipeline configuration
fn validate_audit_config(config: &AuditConfig) -> Result<(), ConfigError> {
    if config.discovery_batch_size < 1 || config.discovery_batch_size > 100 {
        return Err(ConfigError::Validation(format!(
            "discovery_batch_size must be between 1 and 100, got {}",
            config.discovery_batch_size
        )));
    }

    if config.max_queue < 1 {
        return Err(ConfigError::Validation(format!(
            "max_queue must be >= 1, got {}",
            config.max_queue
        )));
    }

    if config.links_per_page < 1 {
        return Err(ConfigError::Validation(format!(
            "links_per_page must be >= 1, got {}",
            config.links_per_page
        )));
    }

    if let Some(batch_size) = config.batch_size {
        if batch_size < 1 || batch_size > 50 {
            return Err(ConfigError::Validation(format!(
                "batch_size must be between 1 and 50, got {}",
                batch_size
            )));
        }
    }

    if let Some(parallel) = config.parallel_batches {
        if parallel < 1 || parallel > 10 {
            return Err(ConfigError::Validation(format!(
                "parallel_batches must be between 1 and 10, got {}",
                parallel
            )));
        }
    }

    Ok(())
}

/// Validates job configuration
fn validate_job_config(config: &JobConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.lock_renew_secs < 1 || config.lock_renew_secs >= config.timeout_secs {
        return Err(ConfigError::Validation(format!(
            "lock_renew_secs must be >= 1 and shorter than timeout_secs ({}), got {}",
            config.timeout_secs, config.lock_renew_secs
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.report_path.is_empty() {
        return Err(ConfigError::Validation(
            "report_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates client entries
fn validate_clients(clients: &[ClientEntry]) -> Result<(), ConfigError> {
    for (index, entry) in clients.iter().enumerate() {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "client #{} has an empty id",
                index + 1
            )));
        }

        if clients[..index].iter().any(|other| other.id == entry.id) {
            return Err(ConfigError::Validation(format!(
                "client id '{}' is declared more than once",
                entry.id
            )));
        }

        validate_website(&entry.website)?;
    }

    Ok(())
}

/// Validates a client website (scheme optional)
fn validate_website(website: &str) -> Result<(), ConfigError> {
    if website.trim().is_empty() {
        return Err(ConfigError::InvalidUrl(
            "Client website cannot be empty".to_string(),
        ));
    }

    let candidate = if website.contains("://") {
        website.to_string()
    } else {
        format!("https://{}", website)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid website '{}': {}", website, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Website '{}' must use http or https",
            website
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Website '{}' has no host",
            website
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_website() {
        assert!(validate_website("example.com").is_ok());
        assert!(validate_website("https://example.com").is_ok());
        assert!(validate_website("http://sub.example.com/").is_ok());

        assert!(validate_website("").is_err());
        assert!(validate_website("ftp://example.com").is_err());
    }

    #[test]
    fn test_duplicate_client_ids_rejected() {
        let mut config = Config::default();
        config.clients = vec![
            ClientEntry {
                id: "acme".to_string(),
                website: "acme.com".to_string(),
            },
            ClientEntry {
                id: "acme".to_string(),
                website: "acme.org".to_string(),
            },
        ];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_lock_renew_must_be_shorter_than_timeout() {
        let mut config = Config::default();
        config.job.lock_renew_secs = config.job.timeout_secs;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_user_agents_rejected() {
        let mut config = Config::default();
        config.fetcher.user_agents.clear();
        assert!(validate(&config).is_err());
    }
}

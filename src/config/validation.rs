use crate::config::types::{Config, FetchConfig, OutputConfig, RunConfig, UrlsConfig};
use crate::fetcher::{parse_dns_override, MAX_URLS, MAX_URL_LEN};
use crate::ConfigError;
use url::Url;

/// Upper bound on the worker count
pub const MAX_WORKERS: usize = 1024;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_config(&config.run)?;
    validate_fetch_config(&config.fetch)?;
    validate_urls_config(&config.urls)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.interval < 1 {
        return Err(ConfigError::Validation(
            "interval must be at least 1ms".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if let Some(pins) = config.dns_override.as_deref().filter(|p| !p.trim().is_empty()) {
        parse_dns_override(pins)
            .map_err(|e| ConfigError::Validation(format!("Invalid dns-override: {}", e)))?;
    }
    Ok(())
}

fn validate_urls_config(config: &UrlsConfig) -> Result<(), ConfigError> {
    match (&config.list, &config.location) {
        (Some(_), Some(_)) => Err(ConfigError::Validation(
            "Set either a URL list or a URL list location, not both".to_string(),
        )),
        (None, None) => Err(ConfigError::Validation(
            "No URLs given: set a URL list or a URL list location".to_string(),
        )),
        (None, Some(location)) => validate_url(location),
        (Some(list), None) => {
            if list.is_empty() {
                return Err(ConfigError::Validation("URL list is empty".to_string()));
            }
            if list.len() > MAX_URLS {
                return Err(ConfigError::Validation(format!(
                    "URL list has {} entries, at most {} are allowed",
                    list.len(),
                    MAX_URLS
                )));
            }
            list.iter().try_for_each(|url| validate_url(url))
        }
    }
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Checks that a URL is dispatchable: http or https, and short enough to
/// fit in one command frame
fn validate_url(raw: &str) -> Result<(), ConfigError> {
    if raw.len() > MAX_URL_LEN {
        return Err(ConfigError::InvalidUrl(format!(
            "URL is {} bytes long, at most {} are allowed",
            raw.len(),
            MAX_URL_LEN
        )));
    }

    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid URL '{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "URL '{}' must use the http or https scheme",
            raw
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.urls.list = Some(vec!["http://example.com/".to_string()]);
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid()).is_ok());

        let mut remote = Config::default();
        remote.urls.location = Some("https://example.com/urls.txt".to_string());
        assert!(validate(&remote).is_ok());
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = valid();
        config.run.workers = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.run.workers = MAX_WORKERS;
        assert!(validate(&config).is_ok());

        config.run.workers = MAX_WORKERS + 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = valid();
        config.run.interval = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_exactly_one_url_source() {
        let mut config = valid();
        config.urls.location = Some("http://example.com/list".to_string());
        assert!(validate(&config).is_err());

        assert!(validate(&Config::default()).is_err());
    }

    #[test]
    fn test_url_list_limits() {
        let mut config = valid();
        config.urls.list = Some(Vec::new());
        assert!(validate(&config).is_err());

        config.urls.list = Some(vec!["http://example.com/".to_string(); MAX_URLS + 1]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("http://example.com/").is_ok());
        assert!(validate_url("https://example.com:8443/a?b=c").is_ok());

        assert!(validate_url("").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("ftp://example.com/").is_err());

        let long = format!("http://example.com/{}", "a".repeat(MAX_URL_LEN));
        assert!(matches!(validate_url(&long), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_dns_override() {
        let mut config = valid();
        config.fetch.dns_override = Some("example.com=127.0.0.1".to_string());
        assert!(validate(&config).is_ok());

        config.fetch.dns_override = Some("example.com".to_string());
        assert!(validate(&config).is_err());

        config.fetch.dns_override = Some(String::new());
        assert!(validate(&config).is_ok());
    }
}

use crate::config::types::Config;
use crate::config::validation::validate;
use crate::fetcher::url_lines;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Loads, parses and validates a complete configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use http_getter::config::load_config;
///
/// let config = load_config(Path::new("getter.toml")).unwrap();
/// println!("Workers: {}", config.run.workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Parses a configuration file without validating it
///
/// Use this when command-line overrides are applied afterwards; call
/// [`validate`](crate::config::validate) on the merged result.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is logged at start-up so runs can be matched to the exact
/// configuration they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Reads a configuration and returns both the unvalidated config and its hash
pub fn read_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = read_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Reads a newline-delimited URL file; `-` reads standard input
///
/// Blank lines and `#` comments are skipped, as in a remote URL list, but
/// nothing is capped or truncated: an oversized file fails [`validate`].
pub fn load_url_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = if path.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        content
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(url_lines(&content).map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{AddressFamily, MAX_URLS, MAX_URL_LEN};
    use crate::getter::UrlSource;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[run]
workers = 8
interval = 500
run-length = 0
count = 10
stop-on-error = true

[fetch]
timeout = 2000
dns-override = "example.com=127.0.0.1"
address-family = "ipv6"
progress-interval = 1000

[urls]
list = ["http://example.com/", "https://example.com/big"]

[output]
path = "report.log"
"#;

        let file = create_temp_file(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.run.workers, 8);
        assert_eq!(config.run.interval, 500);
        assert_eq!(config.run_length(), None);
        assert_eq!(config.cycle_limit(), Some(10));
        assert!(config.run.stop_on_error);
        assert_eq!(config.fetch.address_family, AddressFamily::Ipv6);
        assert_eq!(config.fetch.dns_override.as_deref(), Some("example.com=127.0.0.1"));
        assert_eq!(config.output_path(), Some("report.log"));
        assert!(matches!(config.url_source(), UrlSource::Static(urls) if urls.len() == 2));
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let file = create_temp_file("[urls]\nlocation = \"http://example.com/urls.txt\"\n");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.run.workers, 4);
        assert_eq!(config.run.interval, 200);
        assert_eq!(config.fetch.timeout, 0);
        assert_eq!(
            config.url_source(),
            UrlSource::Remote("http://example.com/urls.txt".to_string())
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/getter.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_file("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let file = create_temp_file("[run]\nworkerz = 3\n");
        assert!(matches!(read_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[run]
workers = 0

[urls]
list = ["http://example.com/"]
"#;

        let file = create_temp_file(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_read_config_skips_validation() {
        // No URLs yet: they may still come from the command line.
        let file = create_temp_file("[run]\nworkers = 2\n");
        let (config, hash) = read_config_with_hash(file.path()).unwrap();
        assert_eq!(config.run.workers, 2);
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_file("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_file("content 1");
        let file2 = create_temp_file("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_load_url_file() {
        let file = create_temp_file("http://a.example/\n\n# comment\n  http://b.example/x  \n");
        let urls = load_url_file(file.path()).unwrap();
        assert_eq!(urls, vec!["http://a.example/", "http://b.example/x"]);
    }

    #[test]
    fn test_oversized_url_file_fails_validation() {
        let content: String = (0..MAX_URLS + 1)
            .map(|i| format!("http://example.com/{}\n", i))
            .collect();
        let file = create_temp_file(&content);

        let mut config = Config::default();
        config.urls.list = Some(load_url_file(file.path()).unwrap());
        assert_eq!(config.urls.list.as_ref().map(Vec::len), Some(MAX_URLS + 1));
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_over_long_url_in_file_fails_validation() {
        let long = format!("http://example.com/{}", "a".repeat(MAX_URL_LEN));
        let file = create_temp_file(&format!("http://example.com/\n{}\n", long));

        let urls = load_url_file(file.path()).unwrap();
        assert_eq!(urls[1], long);

        let mut config = Config::default();
        config.urls.list = Some(urls);
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }
}

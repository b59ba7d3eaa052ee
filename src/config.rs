use std::path::Path;

use serde::Deserialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config {path}: {error}")]
    Read { error: std::io::Error, path: String },
    #[error("failed to parse config {path}: {error}")]
    Parse {
        error: serde_yaml::Error,
        path: String,
    },
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApiConfig {
    /// Root of the gallery API; `api/images` is resolved against it.
    pub base_url: url::Url,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ImageHostConfig {
    pub endpoint: url::Url,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub api: ApiConfig,
    pub image_host: ImageHostConfig,
}

fn check_http(name: &str, url: &url::Url) -> Result<(), String> {
    if matches!(url.scheme(), "http" | "https") {
        Ok(())
    } else {
        Err(format!("{name} must be an http(s) URL, got {url}"))
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let src = tokio::fs::read_to_string(path)
            .await
            .map_err(|error| Error::Read {
                error,
                path: path.display().to_string(),
            })
            .inspect_err(|error| error!(%error, "Failed to read config"))?;
        Self::parse(&src).map_err(|error| Error::Parse {
            error,
            path: path.display().to_string(),
        })
    }

    pub fn parse(src: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(src)
    }

    pub fn validate(&self) -> Result<(), String> {
        check_http("api.base_url", &self.api.base_url)?;
        if !self.api.base_url.path().ends_with('/') {
            return Err(format!(
                "api.base_url must end with '/', got {}",
                self.api.base_url
            ));
        }
        check_http("image_host.endpoint", &self.image_host.endpoint)?;
        if self.image_host.api_key.is_empty() {
            return Err("image_host.api_key is empty".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    const SAMPLE: &str = r#"
api:
  base_url: http://localhost:3000/
image_host:
  endpoint: https://api.imgbb.com/1/upload
  api_key: 0123456789abcdef
"#;

    #[test]
    fn test_parse_and_validate() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.api.base_url.as_str(), "http://localhost:3000/");
        assert_eq!(config.image_host.api_key, "0123456789abcdef");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.image_host.api_key.clear();
        assert!(config.validate().unwrap_err().contains("api_key"));

        let mut config = Config::parse(SAMPLE).unwrap();
        config.api.base_url = "http://localhost:3000/v1".parse().unwrap();
        assert!(config.validate().unwrap_err().contains("end with '/'"));

        let mut config = Config::parse(SAMPLE).unwrap();
        config.image_host.endpoint = "ftp://example.com/upload".parse().unwrap();
        assert!(config.validate().unwrap_err().contains("image_host.endpoint"));
    }

    #[test]
    fn test_missing_section() {
        assert!(Config::parse("api:\n  base_url: http://localhost:3000/\n").is_err());
    }
}

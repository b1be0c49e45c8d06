use estate_atoms::media::validate::DEFAULT_MAX_IMAGE_BYTES;
use listings_block::ListingLimits;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not a valid number: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read once per cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub bucket_name: String,
    pub asset_base_url: String,
    pub cognito_client_id: String,
    pub cognito_client_secret: String,
    pub cognito_user_pool_id: String,
    pub allowed_origins: Vec<String>,
    pub limits: ListingLimits,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let number = |name: &'static str, default: usize| match get(name) {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid { name, value }),
            None => Ok(default),
        };

        let table_name = get("TABLE_NAME").unwrap_or_else(|| "estate".to_string());
        let bucket_name = get("S3_BUCKET_NAME").unwrap_or_else(|| "estate-media".to_string());
        let asset_base_url = get("ASSET_BASE_URL")
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket_name));

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["http://localhost:5173".to_string()]);

        let defaults = ListingLimits::default();
        let limits = ListingLimits {
            max_images: number("MAX_LISTING_IMAGES", defaults.max_images)?,
            max_image_bytes: number("MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
        };

        Ok(Self {
            table_name,
            bucket_name,
            asset_base_url,
            cognito_client_id: required("COGNITO_CLIENT_ID")?,
            cognito_client_secret: required("COGNITO_CLIENT_SECRET")?,
            cognito_user_pool_id: required("COGNITO_USER_POOL_ID")?,
            allowed_origins,
            limits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const COGNITO: [(&str, &str); 3] = [
        ("COGNITO_CLIENT_ID", "client"),
        ("COGNITO_CLIENT_SECRET", "secret"),
        ("COGNITO_USER_POOL_ID", "pool"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&COGNITO)).unwrap();
        assert_eq!(config.table_name, "estate");
        assert_eq!(config.bucket_name, "estate-media");
        assert_eq!(config.asset_base_url, "https://estate-media.s3.amazonaws.com");
        assert_eq!(config.allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.limits.max_images, 6);
        assert_eq!(config.limits.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
    }

    #[test]
    fn test_overrides() {
        let mut vars = COGNITO.to_vec();
        vars.extend([
            ("TABLE_NAME", "estate-prod"),
            ("ALLOWED_ORIGINS", "https://estate.app/, https://www.estate.app"),
            ("MAX_LISTING_IMAGES", "10"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.table_name, "estate-prod");
        assert_eq!(
            config.allowed_origins,
            vec!["https://estate.app", "https://www.estate.app"]
        );
        assert_eq!(config.limits.max_images, 10);
    }

    #[test]
    fn test_missing_cognito_is_an_error() {
        let err = Config::from_lookup(lookup(&COGNITO[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("COGNITO_USER_POOL_ID"));
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let mut vars = COGNITO.to_vec();
        vars.push(("MAX_IMAGE_BYTES", "lots"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid { name: "MAX_IMAGE_BYTES", .. })
        ));
    }
}

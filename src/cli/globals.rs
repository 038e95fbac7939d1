use crate::config::{AppConfig, ConfigOverrides};
use secrecy::{ExposeSecret, SecretString};

/// Everything a backend-facing action needs.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub config: AppConfig,
    pub email: Option<String>,
    pub password: Option<SecretString>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(url: String, api_key: SecretString, overrides: ConfigOverrides) -> Self {
        Self {
            config: AppConfig::new(url, api_key.expose_secret()).with_overrides(overrides),
            email: None,
            password: None,
        }
    }

    pub fn set_credentials(&mut self, email: Option<String>, password: Option<SecretString>) {
        self.email = email;
        self.password = password;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            "https://db.example.com".to_string(),
            SecretString::from("anon"),
            ConfigOverrides {
                activity_limit: Some(10),
                ..ConfigOverrides::default()
            },
        );
        assert_eq!(args.config.backend_url, "https://db.example.com");
        assert_eq!(args.config.api_key.expose_secret(), "anon");
        assert_eq!(args.config.activity_limit, 10);
        assert!(args.email.is_none());
    }
}

use std::path::PathBuf;

/// Logging settings. Read straight from the environment because the
/// subscriber has to exist before the rest of the configuration is parsed.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub production: bool,
    pub level: String,
    pub dir: PathBuf,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let production = get("ENVIRONMENT")
            .or_else(|| get("NODE_ENV"))
            .is_some_and(|env| env == "production");
        let level = get("LOG_LEVEL").unwrap_or_else(|| {
            if production { "info" } else { "debug" }.to_string()
        });

        Self {
            production,
            level,
            dir: get("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }

    /// Default directive when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> String {
        format!(
            "portfolio_server={},tower_http=info,axum=info,sqlx=warn",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> LogConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_level_defaults_follow_environment() {
        assert_eq!(config(&[]).level, "debug");
        assert!(!config(&[]).production);

        let prod = config(&[("NODE_ENV", "production")]);
        assert!(prod.production);
        assert_eq!(prod.level, "info");
    }

    #[test]
    fn test_explicit_level_and_dir() {
        let cfg = config(&[("LOG_LEVEL", "warn"), ("LOG_DIR", "/var/log/portfolio")]);
        assert_eq!(cfg.dir, PathBuf::from("/var/log/portfolio"));
        assert!(cfg.filter_directive().starts_with("portfolio_server=warn"));
    }
}

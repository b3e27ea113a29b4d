#[cfg(test)]
mod tests {
    use crate::config::{self, AppConfig, LoanConfig};

    #[test]
    fn test_valid_config_does_not_error() {
        let result = config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, "sqlite://data/buchwald.db");
        assert_eq!(config.loans.loan_period_days, 14);
        assert_eq!(config.loans.fine_per_day, 0.5);
        assert!(config.security.is_none());
    }

    #[test]
    fn test_loan_config_default_matches_embedded_toml() {
        let loans = LoanConfig::default();
        let embedded = AppConfig::default().loans;
        assert_eq!(loans.loan_period_days, embedded.loan_period_days);
        assert_eq!(loans.fine_per_day, embedded.fine_per_day);
    }

    #[test]
    fn test_ensure_sqlite_parent_dir_creates_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let url = format!("sqlite://{}/buchwald.db", nested.display());

        config::ensure_sqlite_parent_dir(&url).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_ensure_sqlite_parent_dir_ignores_non_sqlite_urls() {
        // Non-sqlite URLs are left alone and do not error
        config::ensure_sqlite_parent_dir("postgres://localhost/buchwald").unwrap();
        config::ensure_sqlite_parent_dir("sqlite::memory:").unwrap();
    }
}

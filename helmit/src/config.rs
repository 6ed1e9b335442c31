use barge::config::Config as BargeConfig;
use harbor::config::Config as HarborConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub barge: BargeConfig,
    #[serde(default)]
    pub harbor: HarborConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.barge.validate()?;
        self.harbor.validate()?;
        Ok(())
    }
}

fn default_metrics_prefix() -> String {
    "helmit".into()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid barge config: {0}")]
    Barge(#[from] barge::config::ValidationError),
    #[error("invalid harbor config: {0}")]
    Harbor(#[from] harbor::config::ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor::config::LogSourceKind;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
            barge:
                location: ec2
                discovery:
                    url: http://idb.services.example.net
                static_endpoints:
                    mss:
                        endpoint: https://10.0.0.1:6443
                        token: mss-token
            harbor:
                listener:
                    host: 0.0.0.0
                    port: 5061
                logs:
                    source: cluster
                    fetch_timeout_secs: 5
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        config.validate().expect("valid config");

        let metrics = config.common.metrics.as_ref().expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "helmit");
        assert_eq!(
            config.common.logging.expect("logging config").sentry_dsn,
            "https://key@sentry.example.com/1"
        );
        assert!(config.barge.discovery.is_some());
        assert_eq!(
            config.barge.static_endpoints["mss"].endpoint,
            "https://10.0.0.1:6443"
        );
        assert_eq!(config.harbor.listener.port, 5061);
        assert_eq!(config.harbor.logs.source, LogSourceKind::Cluster);
        assert_eq!(config.harbor.logs.fetch_timeout_secs, 5);
        assert_eq!(config.harbor.logs.tail, 500);
    }

    #[test]
    fn minimal_config() {
        let tmp = write_tmp_file("barge:\n    fallback_endpoint: https://cluster.internal\n");
        let config = Config::from_file(tmp.path()).expect("load config");
        config.validate().expect("valid config");

        assert_eq!(config.common, CommonConfig::default());
        assert_eq!(config.harbor, HarborConfig::default());
        assert_eq!(
            config.barge.fallback_endpoint.as_deref(),
            Some("https://cluster.internal")
        );
    }

    #[test]
    fn invalid_config() {
        let tmp = write_tmp_file(
            "barge:\n    fallback_endpoint: https://cluster.internal\nharbor:\n    logs:\n        tail: 0\n",
        );
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Harbor(
                harbor::config::ValidationError::InvalidTail
            ))
        ));

        let tmp = write_tmp_file("barge:\n    cache:\n        ttl_secs: 0\n");
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(config.validate(), Err(ConfigError::Barge(_))));

        let tmp = write_tmp_file("harbor:\n    listener:\n        port: 8080\n");
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Barge(
                barge::config::ValidationError::NoEndpointSource
            ))
        ));

        let tmp = write_tmp_file("harbor: [not, a, map]\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/helmit.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}

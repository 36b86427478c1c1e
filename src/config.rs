use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::audio::StreamConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Microphone,
    Wearable,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "microphone" => Ok(SourceKind::Microphone),
            "wearable" => Ok(SourceKind::Wearable),
            other => bail!("Unknown audio source: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 音频配置
    pub source: SourceKind,
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
    pub frame_per_seconds: u32,
    pub capture_device: &'static str,

    // 传输配置
    pub transport_local_ip: &'static str,
    pub transport_local_port: u16,

    pub poll_timeout_ms: u64,
    pub join_timeout_ms: u64,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self> {
        Ok(Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            source: env!("AUDIO_SOURCE").parse()?,
            sample_rate: env!("AUDIO_SAMPLE_RATE")
                .parse()
                .context("Failed to parse AUDIO_SAMPLE_RATE")?,
            frame_duration_ms: env!("AUDIO_FRAME_DURATION_MS")
                .parse()
                .context("Failed to parse AUDIO_FRAME_DURATION_MS")?,
            frame_per_seconds: env!("AUDIO_FRAME_PER_SECONDS")
                .parse()
                .context("Failed to parse AUDIO_FRAME_PER_SECONDS")?,
            capture_device: env!("AUDIO_CAPTURE_DEVICE"),

            transport_local_ip: env!("TRANSPORT_LOCAL_IP"),
            transport_local_port: env!("TRANSPORT_LOCAL_PORT")
                .parse()
                .context("Failed to parse TRANSPORT_LOCAL_PORT")?,

            poll_timeout_ms: env!("CONTROLLER_POLL_TIMEOUT_MS")
                .parse()
                .context("Failed to parse CONTROLLER_POLL_TIMEOUT_MS")?,
            join_timeout_ms: env!("CONTROLLER_JOIN_TIMEOUT_MS")
                .parse()
                .context("Failed to parse CONTROLLER_JOIN_TIMEOUT_MS")?,
        })
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: self.sample_rate,
            frame_duration_ms: self.frame_duration_ms,
            frame_per_seconds: self.frame_per_seconds,
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
        }
    }

    pub fn transport_addr(&self) -> String {
        format!("{}:{}", self.transport_local_ip, self.transport_local_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("wearable".parse::<SourceKind>().unwrap(), SourceKind::Wearable);
        assert_eq!("microphone".parse::<SourceKind>().unwrap(), SourceKind::Microphone);
        assert!("bluetooth".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_build_time_config_is_usable() {
        let config = Config::new().unwrap();
        let stream = config.stream_config();
        assert!(stream.frame_format().is_ok());
        assert!(config.transport_addr().ends_with(&config.transport_local_port.to_string()));
    }
}

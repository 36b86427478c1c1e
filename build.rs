use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    audio: Audio,
    transport: Transport,
    controller: Controller,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Audio {
    source: String,
    sample_rate: u32,
    frame_duration_ms: u32,
    frame_per_seconds: u32,
    capture_device: String,
}

#[derive(Deserialize)]
struct Transport {
    local_ip: String,
    local_port: u16,
}

#[derive(Deserialize)]
struct Controller {
    poll_timeout_ms: u64,
    join_timeout_ms: u64,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    if !matches!(config.audio.source.as_str(), "wearable" | "microphone") {
        panic!("audio.source must be \"wearable\" or \"microphone\", got {:?}", config.audio.source);
    }

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 音频配置
    println!("cargo:rustc-env=AUDIO_SOURCE={}", config.audio.source);
    println!("cargo:rustc-env=AUDIO_SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=AUDIO_FRAME_DURATION_MS={}", config.audio.frame_duration_ms);
    println!("cargo:rustc-env=AUDIO_FRAME_PER_SECONDS={}", config.audio.frame_per_seconds);
    println!("cargo:rustc-env=AUDIO_CAPTURE_DEVICE={}", config.audio.capture_device);

    // 传输配置
    println!("cargo:rustc-env=TRANSPORT_LOCAL_IP={}", config.transport.local_ip);
    println!("cargo:rustc-env=TRANSPORT_LOCAL_PORT={}", config.transport.local_port);

    println!("cargo:rustc-env=CONTROLLER_POLL_TIMEOUT_MS={}", config.controller.poll_timeout_ms);
    println!("cargo:rustc-env=CONTROLLER_JOIN_TIMEOUT_MS={}", config.controller.join_timeout_ms);
}

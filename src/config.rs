#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

pub const DATA_FILE: &str = "data.json";
pub const DOWNLOAD_DIR: &str = "downloads";
pub const STATIC_ROOT: &str = "static";
pub const TEMPLATE_PATH: &str = "templates/index.html";
pub const LISTEN_HOST: &str = "127.0.0.1";
pub const LISTEN_PORT: u16 = 5000;
pub const YT_DLP_PROGRAM: &str = "yt-dlp";
pub const MAX_VIDEO_DURATION_SECONDS: f64 = 600.0;
pub const BROWSER_FOR_COOKIES: &str = "chrome";

/// Everything the catalog server needs to know about its surroundings.
///
/// The server always runs with [`CatalogConfig::default`], built from the
/// constants above; paths are relative to the working directory. The struct
/// is passed explicitly to every component so tests can point them at
/// scratch directories and stub tools.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub data_file: PathBuf,
    pub download_dir: PathBuf,
    pub static_root: PathBuf,
    pub template_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub yt_dlp_program: PathBuf,
    pub max_video_duration_secs: f64,
    pub cookie_browser: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DATA_FILE),
            download_dir: PathBuf::from(DOWNLOAD_DIR),
            static_root: PathBuf::from(STATIC_ROOT),
            template_path: PathBuf::from(TEMPLATE_PATH),
            host: LISTEN_HOST.to_string(),
            port: LISTEN_PORT,
            yt_dlp_program: PathBuf::from(YT_DLP_PROGRAM),
            max_video_duration_secs: MAX_VIDEO_DURATION_SECONDS,
            cookie_browser: BROWSER_FOR_COOKIES.to_string(),
        }
    }
}

impl CatalogConfig {
    /// Socket address the server listens on.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let host = self
            .host
            .trim()
            .parse::<IpAddr>()
            .with_context(|| format!("expected an IPv4 or IPv6 listen address, got {:?}", self.host))?;
        Ok(SocketAddr::new(host, self.port))
    }
}

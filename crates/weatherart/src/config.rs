//! Runtime settings resolved from `WEATHERART_*` environment variables.
//!
//! Every field has a default so the tool runs unconfigured on a typical home
//! network; integer variables that fail to parse fall back to their default.

use std::path::PathBuf;

/// Default art category on the TV ("My Photos").
pub const DEFAULT_CATEGORY: &str = "MY-C0002";

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Fallback TV IP when neither `--ip` nor ARP resolution yields one.
    pub tv_ip: String,
    /// TV MAC address, used for ARP lookup and Wake-on-LAN.
    pub tv_mac: Option<String>,
    /// Connection / request timeout in seconds.
    pub timeout_s: u64,
    /// Upload timeout in seconds.
    pub upload_timeout_s: u64,
    /// Wake-on-LAN broadcast address.
    pub wol_broadcast: String,
    /// Wake-on-LAN UDP port.
    pub wol_port: u16,
    /// Seconds to wait after sending a WOL packet.
    pub wol_wait_s: u64,
    /// Art category filter for catalog listings.
    pub category: String,

    /// Open-Meteo forecast endpoint.
    pub open_meteo_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,

    /// Target artwork dimensions, substituted into prompt templates.
    pub image_width: u32,
    pub image_height: u32,
    /// When set, upload this file instead of a generated one.
    pub image_path_override: Option<PathBuf>,

    /// Gemini model used for image generation.
    pub gemini_model: String,
    /// API key from `GEMINI_API_KEY` or `GOOGLE_API_KEY`.
    pub gemini_api_key: Option<String>,

    /// Data directory (`~/.weatherart`): prompts, mocks, outputs, last-id file.
    pub data_dir: PathBuf,
}

impl Settings {
    /// Resolve settings from the environment.
    pub fn from_env() -> Self {
        let data_dir = env_str("WEATHERART_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".weatherart")
            });

        Self {
            tv_ip: env_str("WEATHERART_TV_IP").unwrap_or_else(|| "192.168.200.200".to_string()),
            tv_mac: env_str("WEATHERART_TV_MAC"),
            timeout_s: env_parse("WEATHERART_TIMEOUT_S", 15),
            upload_timeout_s: env_parse("WEATHERART_UPLOAD_TIMEOUT_S", 25),
            wol_broadcast: env_str("WEATHERART_WOL_BROADCAST")
                .unwrap_or_else(|| "255.255.255.255".to_string()),
            wol_port: env_parse("WEATHERART_WOL_PORT", 9),
            wol_wait_s: env_parse("WEATHERART_WOL_WAIT_S", 8),
            category: env_str("WEATHERART_CATEGORY").unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            open_meteo_url: env_str("WEATHERART_OPEN_METEO_URL")
                .unwrap_or_else(|| "https://api.open-meteo.com/v1/forecast".to_string()),
            latitude: env_parse("WEATHERART_LATITUDE", -33.8688),
            longitude: env_parse("WEATHERART_LONGITUDE", 151.2093),
            timezone: env_str("WEATHERART_TIMEZONE").unwrap_or_else(|| "Australia/Sydney".to_string()),
            image_width: env_parse("WEATHERART_IMAGE_WIDTH", 3840),
            image_height: env_parse("WEATHERART_IMAGE_HEIGHT", 2160),
            image_path_override: env_str("WEATHERART_IMAGE_PATH").map(PathBuf::from),
            gemini_model: env_str("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-3-pro-image-preview".to_string()),
            gemini_api_key: env_str("GEMINI_API_KEY").or_else(|| env_str("GOOGLE_API_KEY")),
            data_dir,
        }
    }

    /// Path of the file holding the last selected content id.
    pub fn last_id_file(&self) -> PathBuf {
        self.data_dir.join("last_uploaded_id.txt")
    }

    /// Directory where prompts and generated images are written.
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("generated")
    }

    /// Path of the prompt template library.
    pub fn prompts_file(&self) -> PathBuf {
        self.data_dir.join("prompts.yaml")
    }

    /// Path of the weather mock library.
    pub fn mocks_file(&self) -> PathBuf {
        self.data_dir.join("weather_mocks.yaml")
    }

    /// Category as an option: an empty string means "no filter".
    pub fn category_filter(&self) -> Option<&str> {
        if self.category.is_empty() {
            None
        } else {
            Some(self.category.as_str())
        }
    }
}

fn env_str(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or(default),
        Err(_) => default,
    }
}

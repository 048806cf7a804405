//! CLI subcommands.

pub mod clean;
pub mod generate;
pub mod push;
pub mod upload;

pub use clean::CleanTodayCommand;
pub use generate::GenerateCommand;
pub use push::PushCommand;
pub use upload::UploadCommand;

use std::collections::HashMap;

use crate::art::wake;
use crate::config::Settings;
use crate::{imagegen, prompt, weather};

/// Errors shared by the pipeline subcommands.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Weather error: {0}")]
    Weather(#[from] weather::WeatherError),
    #[error("Prompt error: {0}")]
    Prompt(#[from] prompt::PromptError),
    #[error("Image generation error: {0}")]
    ImageGen(#[from] imagegen::ImageGenError),
    #[error("TV error: {0}")]
    Art(#[from] crate::art::ArtError),
    #[error("Could not find image at {0}")]
    MissingImage(std::path::PathBuf),
    #[error("Upload did not complete cleanly: {0}")]
    UploadFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Run timestamp used to name prompt and image artifacts.
pub(crate) fn run_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Build the prompt text: pick a template, resolve the context (mocked or
/// fetched from Open-Meteo), render.
pub(crate) async fn build_prompt_text(
    settings: &Settings,
    prompt_id: Option<&str>,
    mock_id: Option<&str>,
) -> Result<String> {
    let library = prompt::PromptLibrary::from_file(settings.prompts_file())?;
    let entry = library.pick(prompt_id)?;

    let vars: HashMap<String, String> = match mock_id {
        Some(mock_id) => prompt::load_mock_context(settings.mocks_file(), mock_id)?,
        None => {
            let forecast = weather::fetch_forecast(settings).await?;
            let context = weather::build_prompt_context(
                settings,
                &forecast,
                chrono::Local::now().naive_local(),
            )?;
            context
                .variables()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect()
        }
    };

    Ok(prompt::render_template(&entry.template, &vars))
}

/// Optionally wake the TV, then resolve its IP address.
pub(crate) async fn wake_and_resolve_ip(
    settings: &Settings,
    ip: Option<&str>,
    mac: Option<&str>,
    wake_requested: bool,
    wake_broadcast: &str,
    wake_port: u16,
    wake_wait_s: u64,
) -> String {
    let mac = mac.or(settings.tv_mac.as_deref());

    if wake_requested {
        match mac {
            Some(mac) => wake::wake_and_wait(mac, wake_broadcast, wake_port, wake_wait_s).await,
            None => log::warn!("Wake requested but no MAC provided."),
        }
    }

    wake::select_tv_ip(ip, mac, &settings.tv_ip)
}

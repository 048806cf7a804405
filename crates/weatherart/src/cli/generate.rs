//! `weatherart generate` — render a prompt and generate the artwork
//! without touching the TV.

use argh::FromArgs;

use super::Result;
use crate::config::Settings;
use crate::imagegen::GeminiClient;
use crate::prompt;

/// Generate a weather-based image prompt and image
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "generate")]
pub struct GenerateCommand {
    /// prompt id to use from prompts.yaml (default: random)
    #[argh(option)]
    pub prompt_id: Option<String>,

    /// weather mock id to use from weather_mocks.yaml
    #[argh(option)]
    pub mock_id: Option<String>,
}

impl GenerateCommand {
    pub async fn run(&self, settings: &Settings) -> Result<()> {
        let timestamp = super::run_timestamp();

        let prompt_text = super::build_prompt_text(
            settings,
            self.prompt_id.as_deref(),
            self.mock_id.as_deref(),
        )
        .await?;
        let prompt_path =
            prompt::write_prompt_file(&settings.output_dir(), &timestamp, &prompt_text)?;
        log::info!("Prompt saved to {}", prompt_path.display());

        let client = GeminiClient::new(settings.gemini_api_key.as_deref(), &settings.gemini_model)?;
        let image_path = client
            .generate(&prompt_text, &settings.output_dir(), &timestamp)
            .await?;
        log::info!("Generated image saved to {}", image_path.display());

        Ok(())
    }
}

//! `weatherart push` — the full pipeline: forecast, prompt, artwork,
//! upload, reconcile, select.
//!
//! Prompt and image generation failures downgrade to warnings (a stale or
//! bundled image still gets pushed); only a missing source image or a
//! total upload failure fails the run.

use argh::FromArgs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{PipelineError, Result};
use crate::art::{ArtSession, FrameTv};
use crate::config::Settings;
use crate::imagegen::GeminiClient;
use crate::prompt;
use crate::reconcile::{
    finalize_selection, resolve_content_id, upload_with_timeout, LastIdStore, UploadOutcome,
};

/// Generate a weather-based image and upload it to the Frame TV
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "push")]
pub struct PushCommand {
    /// prompt id to use from prompts.yaml (default: random)
    #[argh(option)]
    pub prompt_id: Option<String>,

    /// tv IP address (default: resolve from MAC or fall back to config)
    #[argh(option)]
    pub ip: Option<String>,

    /// tv MAC address for resolving IP (default: WEATHERART_TV_MAC)
    #[argh(option)]
    pub mac: Option<String>,

    /// send a Wake-on-LAN packet before connecting
    #[argh(switch)]
    pub wake: bool,

    /// wol broadcast address (default: 255.255.255.255)
    #[argh(option)]
    pub wake_broadcast: Option<String>,

    /// wol UDP port (default: 9)
    #[argh(option)]
    pub wake_port: Option<u16>,

    /// seconds to wait after WOL (default: 8)
    #[argh(option)]
    pub wake_wait: Option<u64>,

    /// matte style to use (default: none)
    #[argh(option, default = "String::from(\"none\")")]
    pub matte: String,

    /// connection timeout in seconds (default: 15)
    #[argh(option)]
    pub timeout: Option<u64>,

    /// upload timeout in seconds (default: 25)
    #[argh(option)]
    pub upload_timeout: Option<u64>,
}

impl PushCommand {
    pub async fn run(&self, settings: &Settings) -> Result<()> {
        match self.pipeline(settings).await {
            Ok(()) => Ok(()),
            // These two are the only exit-worthy failures.
            Err(e @ PipelineError::MissingImage(_)) | Err(e @ PipelineError::UploadFailed(_)) => {
                Err(e)
            }
            Err(e) => {
                log::error!("Failed to upload image: {e}");
                log::info!("Tip: Ensure TV is ON and on the same Wifi.");
                log::info!("Tip: If you see 'Connection refused', check the IP address.");
                Ok(())
            }
        }
    }

    async fn pipeline(&self, settings: &Settings) -> Result<()> {
        let ip = super::wake_and_resolve_ip(
            settings,
            self.ip.as_deref(),
            self.mac.as_deref(),
            self.wake,
            self.wake_broadcast
                .as_deref()
                .unwrap_or(&settings.wol_broadcast),
            self.wake_port.unwrap_or(settings.wol_port),
            self.wake_wait.unwrap_or(settings.wol_wait_s),
        )
        .await;

        let timeout_s = self.timeout.unwrap_or(settings.timeout_s);
        log::info!("Attempting to connect to {ip}...");
        let mut session: Arc<dyn ArtSession> = Arc::new(FrameTv::connect(&ip, timeout_s).await?);

        let timestamp = super::run_timestamp();

        // Prompt and image generation are best-effort: a failure here still
        // leaves the override or bundled image to push.
        let prompt_text = match super::build_prompt_text(settings, self.prompt_id.as_deref(), None)
            .await
        {
            Ok(text) => {
                match prompt::write_prompt_file(&settings.output_dir(), &timestamp, &text) {
                    Ok(path) => log::info!("Prompt saved to {}", path.display()),
                    Err(e) => log::warn!("Failed to save prompt: {e}"),
                }
                Some(text)
            }
            Err(e) => {
                log::warn!("Failed to build prompt: {e}");
                None
            }
        };

        let mut generated_path = None;
        if let Some(prompt_text) = &prompt_text {
            let generated = async {
                let client =
                    GeminiClient::new(settings.gemini_api_key.as_deref(), &settings.gemini_model)?;
                client
                    .generate(prompt_text, &settings.output_dir(), &timestamp)
                    .await
            }
            .await;
            match generated {
                Ok(path) => {
                    log::info!("Generated image saved to {}", path.display());
                    generated_path = Some(path);
                }
                Err(e) => log::warn!("Failed to generate image: {e}"),
            }
        }

        let upload_path = resolve_upload_path(settings, generated_path);
        if !upload_path.exists() {
            return Err(PipelineError::MissingImage(upload_path));
        }

        let category = settings.category_filter();
        let store = LastIdStore::new(settings.last_id_file());
        let last_id = store.load();

        let before = session.available(category).await?;

        log::info!("Uploading image to Frame TV...");
        let outcome = upload_with_timeout(
            session.clone(),
            upload_path,
            self.matte.clone(),
            Duration::from_secs(self.upload_timeout.unwrap_or(settings.upload_timeout_s)),
        )
        .await;

        let (upload_error, hard_failure) = match &outcome {
            UploadOutcome::Confirmed(_) => (None, false),
            UploadOutcome::Failed(e) => (Some(e.to_string()), true),
            UploadOutcome::TimedOut => (Some("upload timed out".to_string()), false),
        };
        if let Some(reason) = &upload_error {
            log::warn!("Upload did not complete cleanly: {reason}");
            // Best-effort close; a hung upload task may still own the
            // channel, in which case this is a no-op.
            if let Err(e) = session.close().await {
                log::debug!("Session close failed: {e}");
            }
            // Fresh channel for the reconciliation queries.
            session = Arc::new(FrameTv::connect(&ip, timeout_s).await?);
        }

        match resolve_content_id(session.as_ref(), &before, outcome, category).await? {
            Some(content_id) => {
                log::info!("Selecting the new image...");
                finalize_selection(
                    session.as_ref(),
                    &store,
                    &content_id,
                    category,
                    last_id.as_deref(),
                )
                .await?;
            }
            None => {
                // A hard upload error with no identifiable artwork is a
                // failed run; a bare timeout probably still worked.
                if hard_failure {
                    return Err(PipelineError::UploadFailed(
                        upload_error.unwrap_or_else(|| "unknown upload error".to_string()),
                    ));
                }
                log::warn!("Upload likely succeeded, but the new image ID wasn't found.");
                log::info!("Open Art Mode on the TV and check My Photos.");
            }
        }

        log::info!("Done! Look at your TV.");
        Ok(())
    }
}

fn resolve_upload_path(settings: &Settings, generated: Option<PathBuf>) -> PathBuf {
    if let Some(path) = generated {
        return path;
    }
    if let Some(path) = &settings.image_path_override {
        return path.clone();
    }
    settings.data_dir.join("test-art.png")
}

//! `weatherart upload` — push a specific image file to the TV.
//!
//! Unlike `push`, this command has a known-good local file and no fallback
//! chain, so an upload that fails or yields no content id is fatal.

use argh::FromArgs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{PipelineError, Result};
use crate::art::{ArtSession, FrameTv};
use crate::config::Settings;
use crate::reconcile::{upload_with_timeout, LastIdStore, UploadOutcome};

/// Upload a specific image to the Frame TV
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "upload")]
pub struct UploadCommand {
    /// path to the image file to upload
    #[argh(positional)]
    pub image_path: PathBuf,

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

    /// delete the previously uploaded image after selecting the new one
    #[argh(switch)]
    pub replace_last: bool,

    /// connection timeout in seconds (default: 15)
    #[argh(option)]
    pub timeout: Option<u64>,

    /// upload timeout in seconds (default: 25)
    #[argh(option)]
    pub upload_timeout: Option<u64>,
}

impl UploadCommand {
    pub async fn run(&self, settings: &Settings) -> Result<()> {
        let image_path = std::fs::canonicalize(&self.image_path)
            .map_err(|_| PipelineError::MissingImage(self.image_path.clone()))?;

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

        log::info!("Attempting to connect to {ip}...");
        let session: Arc<dyn ArtSession> =
            Arc::new(FrameTv::connect(&ip, self.timeout.unwrap_or(settings.timeout_s)).await?);

        let store = LastIdStore::new(settings.last_id_file());
        let last_id = store.load();

        log::info!("Uploading image: {}", image_path.display());
        let outcome = upload_with_timeout(
            session.clone(),
            image_path,
            self.matte.clone(),
            Duration::from_secs(self.upload_timeout.unwrap_or(settings.upload_timeout_s)),
        )
        .await;

        let content_id = match outcome {
            UploadOutcome::Confirmed(content_id) => content_id,
            UploadOutcome::Failed(e) => {
                return Err(PipelineError::UploadFailed(e.to_string()));
            }
            UploadOutcome::TimedOut => {
                return Err(PipelineError::UploadFailed(
                    "upload likely succeeded, but no content_id was returned".to_string(),
                ));
            }
        };

        log::info!("Selecting the new image...");
        session
            .select_image(&content_id, settings.category_filter())
            .await?;
        store.save(&content_id);

        if self.replace_last {
            if let Some(last_id) = last_id.filter(|id| id != &content_id) {
                log::info!("Removing previously uploaded image: {last_id}");
                if let Err(e) = session.delete(&last_id).await {
                    log::warn!("Could not delete previous image: {e}");
                }
            }
        }

        log::info!("Done! Look at your TV.");
        Ok(())
    }
}

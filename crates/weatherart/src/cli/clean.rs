//! `weatherart clean-today` — remove artworks added today.
//!
//! Filters the catalog on the `image_date` prefix the TV stamps uploads
//! with, then issues one bulk delete.

use argh::FromArgs;

use super::Result;
use crate::art::{ArtItem, ArtSession, FrameTv};
use crate::config::Settings;

/// Remove images added today from the Frame TV
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "clean-today")]
pub struct CleanTodayCommand {
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

    /// connection timeout in seconds (default: 15)
    #[argh(option)]
    pub timeout: Option<u64>,

    /// art category to filter (default: My Photos; empty scans all)
    #[argh(option)]
    pub category: Option<String>,
}

impl CleanTodayCommand {
    pub async fn run(&self, settings: &Settings) -> Result<()> {
        let today_prefix = chrono::Local::now().format("%Y:%m:%d").to_string();

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
        let session = FrameTv::connect(&ip, self.timeout.unwrap_or(settings.timeout_s)).await?;

        let category = self.category.as_deref().unwrap_or(&settings.category);
        let category = (!category.is_empty()).then_some(category);
        let items = session.available(category).await?;

        let to_delete: Vec<String> = items
            .iter()
            .filter(|item| is_from_today(item, &today_prefix))
            .map(|item| item.content_id.clone())
            .collect();

        if to_delete.is_empty() {
            log::info!("No images from today found.");
            return Ok(());
        }

        log::info!("Deleting {} image(s) from today...", to_delete.len());
        session.delete_list(&to_delete).await?;
        log::info!("Done.");
        Ok(())
    }
}

fn is_from_today(item: &ArtItem, today_prefix: &str) -> bool {
    item.field("image_date")
        .and_then(|v| v.as_str())
        .is_some_and(|date| date.starts_with(today_prefix))
}

//! Weather-driven artwork for the Samsung Frame TV.
//!
//! The pipeline: fetch an hourly forecast from Open-Meteo, render it into an
//! image-generation prompt from YAML templates, ask Gemini for an artwork,
//! upload it to the TV over the art-mode websocket channel, then reconcile
//! which remote catalog entry is the one just uploaded (the upload call does
//! not reliably return an identifier).

pub mod art;
pub mod cli;
pub mod config;
pub mod imagegen;
pub mod prompt;
pub mod reconcile;
pub mod weather;

pub use art::{ArtError, ArtItem, ArtSession, FrameTv};
pub use config::Settings;
pub use reconcile::{LastIdStore, UploadOutcome};

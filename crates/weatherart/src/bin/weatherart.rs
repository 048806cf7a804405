//! weatherart CLI
//!
//! Usage:
//!   weatherart push                      # Forecast -> prompt -> artwork -> TV
//!   weatherart push --prompt-id sydney-nolan
//!   weatherart generate --mock-id clear_summer_day
//!   weatherart upload ./art.png --replace-last
//!   weatherart clean-today               # Remove artworks uploaded today

use argh::FromArgs;
use weatherart::cli::{CleanTodayCommand, GenerateCommand, PushCommand, UploadCommand};
use weatherart::Settings;

/// Weather-driven artwork for the Samsung Frame TV
#[derive(FromArgs)]
struct Args {
    /// show version information
    #[argh(switch, short = 'V')]
    version: bool,

    /// logging level (default: info)
    #[argh(option, default = "String::from(\"info\")")]
    log_level: String,

    /// optional log file path; when set, logs go to this file instead
    #[argh(option)]
    log_file: Option<String>,

    #[argh(subcommand)]
    command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Push(PushCommand),
    Generate(GenerateCommand),
    Upload(UploadCommand),
    CleanToday(CleanTodayCommand),
}

fn init_logging(level: &str, log_file: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file {path}: {e}"))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(env_logger::Target::Stderr);
        }
    }
    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = argh::from_env();

    if args.version {
        println!("weatherart {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logging(&args.log_level, args.log_file.as_deref())?;
    let settings = Settings::from_env();

    match args.command {
        None => {
            eprintln!("weatherart - Weather-driven artwork for the Samsung Frame TV\n");
            eprintln!("Usage: weatherart <command>\n");
            eprintln!("Commands:");
            eprintln!("  push        Generate a weather-based image and upload it:");
            eprintln!("                --prompt-id <id>: Template from prompts.yaml");
            eprintln!("                --wake: Send Wake-on-LAN before connecting");
            eprintln!("  generate    Render a prompt and generate the artwork only:");
            eprintln!("                --mock-id <id>: Offline weather from weather_mocks.yaml");
            eprintln!("  upload      Upload a specific image file:");
            eprintln!("                --replace-last: Delete the previous upload");
            eprintln!("  clean-today Remove artworks uploaded today:");
            eprintln!("                --category <id>: Catalog filter (empty scans all)");
            eprintln!("\nRun 'weatherart <command> --help' for more information.");
            Ok(())
        }
        Some(Command::Push(cmd)) => {
            cmd.run(&settings)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        }
        Some(Command::Generate(cmd)) => {
            cmd.run(&settings)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        }
        Some(Command::Upload(cmd)) => {
            cmd.run(&settings)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        }
        Some(Command::CleanToday(cmd)) => {
            cmd.run(&settings)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}

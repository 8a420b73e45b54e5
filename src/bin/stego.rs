//! # Command-Line Front End
//!
//! Thin wrapper over [`Steganographer`] for hiding and recovering messages.
//!
//! ## Usage
//!
//! ```bash
//! # Hide a message behind a password and a one-time code
//! cargo run --bin stego -- encode --input photo.png --message "meet at noon" \
//!   --password hunter2 --totp
//!
//! # See which factors an image needs
//! cargo run --bin stego -- inspect --input hidden_photo.png
//!
//! # Recover it
//! cargo run --bin stego -- decode --input hidden_photo.png \
//!   --password hunter2 --totp-code 123456
//! ```
//!
//! Face protection takes a photo in place of a live camera frame
//! (`--face-frame me.jpg`) at both ends.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use stegaguard::common::logging::init_logger;
use stegaguard::factors::camera::{Camera, StillFrameDevice};
use stegaguard::factors::{totp, TotpSecret};
use stegaguard::{
    CarrierImage, DecodeOutcome, EncodeFactors, StegoConfig, Steganographer, SuppliedFactors,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hide a message in an image
    Encode {
        /// Cover image (any format; output is always PNG)
        #[arg(short, long)]
        input: PathBuf,

        /// Message to hide
        #[arg(short, long)]
        message: String,

        /// Output path (default: <prefix><stem>.png next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Protect with a password
        #[arg(long)]
        password: Option<String>,

        /// Protect with a time-based one-time code
        #[arg(long)]
        totp: bool,

        /// Protect with a face: photo used for enrollment
        #[arg(long)]
        face_frame: Option<PathBuf>,

        /// Allow hiding the message with no protection at all
        #[arg(long)]
        no_protection: bool,
    },

    /// Show whether an image carries a hidden message and what it needs
    Inspect {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Recover a hidden message
    Decode {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        totp_code: Option<String>,

        /// Photo compared against the enrolled face
        #[arg(long)]
        face_frame: Option<PathBuf>,
    },

    /// Print the current one-time code for a Base32 secret
    TotpCode {
        #[arg(short, long)]
        secret: String,
    },
}

fn main() -> Result<()> {
    init_logger();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => StegoConfig::from_file(path)?,
        None => StegoConfig::default(),
    };
    let stego = Steganographer::new(config);

    match args.command {
        Command::Encode {
            input,
            message,
            output,
            password,
            totp,
            face_frame,
            no_protection,
        } => {
            let carrier = CarrierImage::open(&input)?;

            let face_template = match face_frame {
                Some(path) => Some(Camera::new(StillFrameDevice::open_path(path)?).enroll()?),
                None => None,
            };

            let outcome = stego.encode(
                &carrier,
                &message,
                EncodeFactors {
                    password,
                    enable_totp: totp,
                    face_template,
                    confirm_unprotected: no_protection,
                },
            )?;

            let output = output.unwrap_or_else(|| default_output(&stego, &input));
            outcome.image.save_png(&output)?;
            info!("💾 Saved {}", output.display());

            if let Some(provisioning) = outcome.totp_provisioning {
                println!("TOTP secret (shown once): {}", provisioning.secret_base32);
                println!("Provisioning URI: {}", provisioning.uri);
            }
            println!("Wrote {}", output.display());
            println!("Keep this file lossless (PNG); recompressing it destroys the hidden data.");
        }

        Command::Inspect { input } => {
            let carrier = CarrierImage::open(&input)?;
            let inspection = stego.inspect(&carrier);
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        }

        Command::Decode {
            input,
            password,
            totp_code,
            face_frame,
        } => {
            let carrier = CarrierImage::open(&input)?;

            let face_frame = match face_frame {
                Some(path) => {
                    let device = StillFrameDevice::open_path(path)?;
                    Some(Camera::new(device).verification_frame()?)
                }
                None => None,
            };

            let supplied = SuppliedFactors {
                password,
                totp_code,
                face_frame,
            };

            match stego.decode(&carrier, &supplied)? {
                DecodeOutcome::NothingHidden => println!("No hidden data found."),
                DecodeOutcome::Message(message) => println!("{}", message),
            }
        }

        Command::TotpCode { secret } => {
            let secret = TotpSecret::from_base32(&secret)?;
            if secret.as_bytes().is_empty() {
                bail!("secret is empty");
            }
            println!("{}", totp::code_at(&secret, chrono::Utc::now().timestamp()));
        }
    }

    Ok(())
}

fn default_output(stego: &Steganographer, input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    input.with_file_name(stego.config().output_file_name(name))
}

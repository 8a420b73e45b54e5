//! Web server for the steganography API
//!
//! Routes:
//! - `GET  /api/health`
//! - `POST /api/face/enroll`: multipart `frame` → `{ template_id }`
//! - `POST /api/inspect`: multipart `image` → `{ has_container, required_factors }`
//! - `POST /api/encode`: multipart `image`, `message`, `password`, `enable_totp`,
//!   `face_template_id`, `confirm_unprotected` → base64 PNG + TOTP provisioning
//! - `POST /api/decode`: multipart `image`, `password`, `totp_code`, `face` → message
//!
//! Enrolled face templates live only in this process's memory. They are
//! discarded once an encode succeeds with them, or when they expire
//! (`[web] template_ttl_secs`). At most `[web] max_templates` are held.

use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use clap::Parser;
use log::{error, info};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use stegaguard::common::logging::init_logger;
use stegaguard::factors::camera::{Camera, StillFrameDevice};
use stegaguard::factors::enrollment::EnrollmentStore;
use stegaguard::{
    CarrierImage, DecodeOutcome, EncodeFactors, StegoConfig, StegoError, Steganographer,
    SuppliedFactors, TotpProvisioning,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Serialize)]
struct EnrollResponse {
    template_id: Uuid,
}

#[derive(Serialize)]
struct EncodeResponse {
    success: bool,
    file_name: String,
    carrier_image_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    totp: Option<TotpProvisioning>,
}

#[derive(Serialize)]
struct DecodeResponse {
    has_container: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    factor: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.into(),
            factor: None,
        }),
    )
}

fn stego_error(e: StegoError) -> ApiError {
    let status = match &e {
        e if e.is_authentication_failure() => StatusCode::UNAUTHORIZED,
        StegoError::CorruptContainer(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StegoError::Io(_) | StegoError::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            factor: e.factor().map(|f| f.to_string()),
        }),
    )
}

struct AppState {
    stego: Steganographer,
    templates: Mutex<EnrollmentStore>,
}

/// One multipart field: raw bytes plus the client-side filename, if any.
struct FormField {
    file_name: Option<String>,
    data: Vec<u8>,
}

struct Form(HashMap<String, FormField>);

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(format!("Failed to read multipart data: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("Failed to read field '{}': {}", name, e)))?;
            fields.insert(
                name,
                FormField {
                    file_name,
                    data: data.to_vec(),
                },
            );
        }
        Ok(Self(fields))
    }

    fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.0.get(name).map(|f| f.data.as_slice())
    }

    fn require_bytes(&self, name: &str) -> Result<&[u8], ApiError> {
        self.bytes(name)
            .ok_or_else(|| bad_request(format!("No {} provided", name)))
    }

    fn text(&self, name: &str) -> Result<Option<String>, ApiError> {
        self.bytes(name)
            .map(|b| {
                String::from_utf8(b.to_vec())
                    .map_err(|_| bad_request(format!("Field '{}' is not UTF-8", name)))
            })
            .transpose()
    }

    /// Non-empty text field.
    fn non_empty(&self, name: &str) -> Result<Option<String>, ApiError> {
        Ok(self.text(name)?.filter(|s| !s.is_empty()))
    }

    fn flag(&self, name: &str) -> Result<bool, ApiError> {
        Ok(matches!(
            self.text(name)?.as_deref().map(str::trim),
            Some("true" | "1" | "on" | "yes")
        ))
    }

    fn file_name(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|f| f.file_name.as_deref())
    }
}

/// Run CPU-heavy core work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StegoError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("❌ Worker task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                    factor: None,
                }),
            )
        })?
        .map_err(stego_error)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => StegoConfig::from_file(path)?,
        None => StegoConfig::default(),
    };

    info!("🚀 Initializing web server...");

    let addr = config.web.address.clone();
    let body_limit = config.web.max_upload_bytes;
    let templates = EnrollmentStore::new(
        Duration::from_secs(config.web.template_ttl_secs),
        config.web.max_templates,
    );

    let state = Arc::new(AppState {
        stego: Steganographer::new(config),
        templates: Mutex::new(templates),
    });

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/face/enroll", post(enroll_handler))
        .route("/api/inspect", post(inspect_handler))
        .route("/api/encode", post(encode_handler))
        .route("/api/decode", post(decode_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("🌐 Web server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stegaguard",
        "factors": ["password", "totp", "face"]
    }))
}

async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = Form::read(multipart).await?;
    let frame = form.require_bytes("frame")?.to_vec();

    let template = blocking(move || {
        let device = StillFrameDevice::from_bytes(&frame)?;
        Camera::new(device).enroll()
    })
    .await?;

    let template_id = state.templates.lock().await.insert(template);
    info!("📷 Enrolled face template {}", template_id);

    Ok(Json(EnrollResponse { template_id }))
}

async fn inspect_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = Form::read(multipart).await?;
    let image = form.require_bytes("image")?.to_vec();

    let stego = state.stego.clone();
    let inspection = blocking(move || {
        let carrier = CarrierImage::from_bytes(&image)?;
        Ok(stego.inspect(&carrier))
    })
    .await?;

    Ok(Json(inspection))
}

async fn encode_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = Form::read(multipart).await?;

    let image = form.require_bytes("image")?.to_vec();
    let source_name = form.file_name("image").unwrap_or("image.png").to_string();
    let message = form.text("message")?.unwrap_or_default();

    let password = form.non_empty("password")?;
    let enable_totp = form.flag("enable_totp")?;
    let confirm_unprotected = form.flag("confirm_unprotected")?;

    // Taken out of the store for the duration of the encode, put back if it fails
    let enrollment = match form.non_empty("face_template_id")? {
        Some(id) => {
            let id = Uuid::parse_str(&id).map_err(|_| bad_request("Malformed face_template_id"))?;
            let mut templates = state.templates.lock().await;
            let enrolled = templates.enrolled_at(&id);
            match (templates.take(&id), enrolled) {
                (Some(template), Some(enrolled)) => Some((id, template, enrolled)),
                _ => return Err(bad_request("Unknown, expired or already used face_template_id")),
            }
        }
        None => None,
    };

    let factors = EncodeFactors {
        password,
        enable_totp,
        face_template: enrollment.as_ref().map(|(_, template, _)| template.clone()),
        confirm_unprotected,
    };

    info!("📤 Received cover image: {} ({} bytes)", source_name, image.len());

    let stego = state.stego.clone();
    let result = blocking(move || {
        let carrier = CarrierImage::from_bytes(&image)?;
        let outcome = stego.encode(&carrier, &message, factors)?;
        Ok((outcome.image.to_png_bytes()?, outcome.totp_provisioning))
    })
    .await;

    if result.is_err() {
        if let Some((id, template, enrolled)) = enrollment {
            state.templates.lock().await.restore(id, template, enrolled);
        }
    }
    let (png, totp) = result?;

    info!("✅ Encoding complete! Carrier size: {} bytes", png.len());

    Ok((
        StatusCode::OK,
        Json(EncodeResponse {
            success: true,
            file_name: state.stego.config().output_file_name(&source_name),
            carrier_image_base64: general_purpose::STANDARD.encode(&png),
            totp,
        }),
    ))
}

async fn decode_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = Form::read(multipart).await?;

    let image = form.require_bytes("image")?.to_vec();
    let password = form.non_empty("password")?;
    let totp_code = form.non_empty("totp_code")?;
    let face = form.bytes("face").filter(|b| !b.is_empty()).map(<[u8]>::to_vec);

    let stego = state.stego.clone();
    let outcome = blocking(move || {
        let carrier = CarrierImage::from_bytes(&image)?;
        let face_frame = match face {
            Some(bytes) => {
                let device = StillFrameDevice::from_bytes(&bytes)?;
                Some(Camera::new(device).verification_frame()?)
            }
            None => None,
        };
        let supplied = SuppliedFactors {
            password,
            totp_code,
            face_frame,
        };
        stego.decode(&carrier, &supplied)
    })
    .await?;

    let response = match outcome {
        DecodeOutcome::NothingHidden => DecodeResponse {
            has_container: false,
            message: None,
        },
        DecodeOutcome::Message(message) => DecodeResponse {
            has_container: true,
            message: Some(message),
        },
    };
    Ok(Json(response))
}

//! Image I/O operations service
//!
//! Reads every supported [`ImageSource`] form into a decoded image and
//! stores encoded output as one of the [`ImageSink`] forms. Pixel work stays
//! out of here.

use crate::{
    config::{OutputFormat, OutputTarget},
    error::{CompositeError, Result},
    services::format::OutputFormatHandler,
    types::{ImageSink, ImageSource, Orientation},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Directory name used under the user cache directory
const CACHE_DIR_NAME: &str = "selfie-bgreplace";

/// A decoded source image and the orientation its metadata asks for
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub orientation: Orientation,
}

/// Service for handling image input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Read and decode `source`
    ///
    /// `role` ("subject", "background") only feeds error messages.
    ///
    /// # Errors
    /// - `LoadFailure` if the source cannot be read or decoded
    pub fn load(source: ImageSource, role: &str) -> Result<DecodedImage> {
        let origin = source.describe();
        debug!("Loading {} image from {}", role, origin);

        let bytes = match source {
            ImageSource::Image(image) => {
                return Ok(DecodedImage {
                    image,
                    orientation: Orientation::Upright,
                })
            },
            ImageSource::Bytes(bytes) => bytes,
            ImageSource::Base64(data) => {
                Self::decode_base64(&data).map_err(|e| CompositeError::load_error(role, &origin, e))?
            },
            ImageSource::Path(path) => {
                std::fs::read(&path).map_err(|e| CompositeError::load_error(role, &origin, e))?
            },
            ImageSource::Uri(uri) => {
                let path = Self::uri_to_path(&uri)?;
                std::fs::read(&path).map_err(|e| CompositeError::load_error(role, &origin, e))?
            },
        };

        Self::decode_bytes(&bytes, role, &origin)
    }

    /// Decode encoded image bytes, reading the EXIF orientation when present
    pub fn decode_bytes(bytes: &[u8], role: &str, origin: &str) -> Result<DecodedImage> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CompositeError::load_error(role, origin, e))?
            .into_decoder()
            .map_err(|e| CompositeError::load_error(role, origin, e))?;

        let orientation = match decoder.orientation() {
            Ok(orientation) => Orientation::from(orientation),
            Err(e) => {
                debug!("No usable orientation metadata for {}: {}", origin, e);
                Orientation::Upright
            },
        };

        let image =
            DynamicImage::from_decoder(decoder).map_err(|e| CompositeError::load_error(role, origin, e))?;
        Ok(DecodedImage { image, orientation })
    }

    /// Decode a base64 payload
    ///
    /// Accepts an optional `data:<mime>;base64,` header and ignores
    /// whitespace (line-wrapped payloads).
    pub fn decode_base64(data: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        let payload = match data.trim_start().strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map_or(rest, |(_, payload)| payload),
            None => data,
        };
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(compact)
    }

    /// Map a `file://` URI to a local path
    ///
    /// # Errors
    /// - `LoadFailure` for any other scheme
    pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
        uri.strip_prefix("file://")
            .map(PathBuf::from)
            .ok_or_else(|| {
                CompositeError::load(format!(
                    "Unsupported URI '{}': only file:// URIs can be read",
                    uri
                ))
            })
    }

    /// Store encoded bytes according to `target`
    ///
    /// # Errors
    /// - `PersistFailure` if a directory or file cannot be written
    pub fn persist(bytes: &[u8], format: OutputFormat, target: &OutputTarget) -> Result<ImageSink> {
        match target {
            OutputTarget::DataUri => Ok(ImageSink::DataUri(format!(
                "data:{};base64,{}",
                OutputFormatHandler::mime_type(format),
                STANDARD.encode(bytes)
            ))),
            OutputTarget::Base64 => Ok(ImageSink::Base64(STANDARD.encode(bytes))),
            OutputTarget::File(path) => Self::write_file(bytes, path),
            OutputTarget::Directory(dir) => {
                Self::write_file(bytes, &dir.join(Self::unique_file_name(format)))
            },
            OutputTarget::CacheDirectory => {
                let dir = Self::cache_directory()?;
                Self::write_file(bytes, &dir.join(Self::unique_file_name(format)))
            },
        }
    }

    /// Write `bytes` to `path`, creating parent directories
    pub fn write_file(bytes: &[u8], path: &Path) -> Result<ImageSink> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CompositeError::persist(parent, e))?;
        }
        std::fs::write(path, bytes).map_err(|e| CompositeError::persist(path, e))?;
        info!("💾 Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(ImageSink::File(path.to_path_buf()))
    }

    /// Fresh `<uuid>.<ext>` file name
    #[must_use]
    pub fn unique_file_name(format: OutputFormat) -> String {
        format!(
            "{}.{}",
            Uuid::new_v4(),
            OutputFormatHandler::get_extension(format)
        )
    }

    /// `<user cache dir>/selfie-bgreplace`
    pub fn cache_directory() -> Result<PathBuf> {
        dirs::cache_dir()
            .map(|dir| dir.join(CACHE_DIR_NAME))
            .ok_or_else(|| {
                CompositeError::persist(
                    CACHE_DIR_NAME,
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no user cache directory on this platform",
                    ),
                )
            })
    }

    /// Check if a file path has a supported image extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif"
                )
            })
    }
}

//! Configuration for the converter capabilities.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration shared by the converter implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to the LibreOffice binary used for document routes.
    #[serde(default = "default_soffice_path")]
    pub soffice_path: PathBuf,

    /// Path to the pdftotext binary.
    #[serde(default = "default_pdftotext_path")]
    pub pdftotext_path: PathBuf,

    /// Path to the ImageMagick binary.
    #[serde(default = "default_magick_path")]
    pub magick_path: PathBuf,

    /// Timeout for a single external tool invocation in seconds.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// JPEG encoding quality (1-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Maximum duration of a generated GIF in seconds.
    #[serde(default = "default_gif_max_duration")]
    pub gif_max_duration_secs: u32,

    /// Maximum width of a generated GIF in pixels.
    #[serde(default = "default_gif_max_width")]
    pub gif_max_width: u32,

    /// Render density (DPI) for PDF-to-image routes.
    #[serde(default = "default_pdf_density")]
    pub pdf_density: u32,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_soffice_path() -> PathBuf {
    PathBuf::from("soffice")
}

fn default_pdftotext_path() -> PathBuf {
    PathBuf::from("pdftotext")
}

fn default_magick_path() -> PathBuf {
    PathBuf::from("magick")
}

fn default_tool_timeout() -> u64 {
    900
}

fn default_jpeg_quality() -> u8 {
    95
}

fn default_gif_max_duration() -> u32 {
    10
}

fn default_gif_max_width() -> u32 {
    480
}

fn default_pdf_density() -> u32 {
    200
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            soffice_path: default_soffice_path(),
            pdftotext_path: default_pdftotext_path(),
            magick_path: default_magick_path(),
            tool_timeout_secs: default_tool_timeout(),
            jpeg_quality: default_jpeg_quality(),
            gif_max_duration_secs: default_gif_max_duration(),
            gif_max_width: default_gif_max_width(),
            pdf_density: default_pdf_density(),
        }
    }
}

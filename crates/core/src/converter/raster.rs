//! In-process raster image converter built on the `image` crate.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::format::Format;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::Converter;
use super::types::ConvertRequest;

/// Converter for raster-to-raster routes.
pub struct ImageConverter {
    config: ConverterConfig,
}

impl ImageConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    fn image_format(format: Format) -> Option<ImageFormat> {
        match format {
            Format::Jpg | Format::Jpeg => Some(ImageFormat::Jpeg),
            Format::Png => Some(ImageFormat::Png),
            Format::Gif => Some(ImageFormat::Gif),
            Format::Bmp => Some(ImageFormat::Bmp),
            Format::Webp => Some(ImageFormat::WebP),
            Format::Tiff => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// Flattens any alpha channel onto a white background.
    ///
    /// JPEG (and BMP) cannot carry transparency; uploads are frequently
    /// PNGs with an alpha channel, so this mirrors what users expect from
    /// an export rather than failing the encode.
    fn flatten_alpha(img: &DynamicImage) -> RgbImage {
        let rgba = img.to_rgba8();
        let mut flat = RgbImage::new(rgba.width(), rgba.height());
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = a as u32;
            let blend = |channel: u8| -> u8 {
                ((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8
            };
            flat.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
        }
        flat
    }

    fn encode(
        img: DynamicImage,
        output_path: &Path,
        format: ImageFormat,
        jpeg_quality: u8,
    ) -> Result<(), ConverterError> {
        match format {
            ImageFormat::Jpeg => {
                let flat = Self::flatten_alpha(&img);
                let file = File::create(output_path)?;
                let mut writer = BufWriter::new(file);
                let encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, jpeg_quality);
                flat.write_with_encoder(encoder)
                    .map_err(|e| ConverterError::conversion_failed(e.to_string(), None))?;
            }
            ImageFormat::Bmp | ImageFormat::Gif => {
                // Encoders without alpha support get the flattened image too.
                let flat = Self::flatten_alpha(&img);
                flat.save_with_format(output_path, format)
                    .map_err(|e| ConverterError::conversion_failed(e.to_string(), None))?;
            }
            _ => {
                img.save_with_format(output_path, format)
                    .map_err(|e| ConverterError::conversion_failed(e.to_string(), None))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Converter for ImageConverter {
    fn name(&self) -> &str {
        "image"
    }

    async fn convert(&self, request: ConvertRequest) -> Result<PathBuf, ConverterError> {
        if !request.input_path.exists() {
            return Err(ConverterError::InputNotFound {
                path: request.input_path.clone(),
            });
        }

        let Some(format) = Self::image_format(request.target_format) else {
            return Err(ConverterError::UnsupportedRoute {
                from: request.source_format,
                target: request.target_format,
            });
        };

        let output_path = request.default_output_path();
        let jpeg_quality = self.config.jpeg_quality;
        let input_path = request.input_path.clone();
        let result_path = output_path.clone();

        // Decoding and encoding are CPU-bound; keep them off the runtime.
        tokio::task::spawn_blocking(move || -> Result<(), ConverterError> {
            let img = image::open(&input_path)
                .map_err(|e| ConverterError::conversion_failed(e.to_string(), None))?;
            Self::encode(img, &output_path, format, jpeg_quality)
        })
        .await
        .map_err(|e| ConverterError::conversion_failed(format!("decode task panicked: {}", e), None))??;

        super::exec::verify_output(&result_path).await?;
        Ok(result_path)
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        // No external tooling to check.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_test_png(path: &Path) {
        let mut img = image::RgbaImage::new(4, 4);
        for pixel in img.pixels_mut() {
            *pixel = Rgba([200, 100, 50, 128]);
        }
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    fn request(temp: &tempfile::TempDir, source: Format, target: Format) -> ConvertRequest {
        ConvertRequest {
            job_id: "test".to_string(),
            input_path: temp.path().join("input.png"),
            source_format: source,
            target_format: target,
            output_dir: temp.path().to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_png_to_jpg() {
        let temp = tempfile::tempdir().unwrap();
        write_test_png(&temp.path().join("input.png"));

        let converter = ImageConverter::with_defaults();
        let output = converter
            .convert(request(&temp, Format::Png, Format::Jpg))
            .await
            .unwrap();

        assert!(output.exists());
        let reloaded = image::open(&output).unwrap();
        assert_eq!(reloaded.width(), 4);
    }

    #[tokio::test]
    async fn test_png_to_webp() {
        let temp = tempfile::tempdir().unwrap();
        write_test_png(&temp.path().join("input.png"));

        let converter = ImageConverter::with_defaults();
        let output = converter
            .convert(request(&temp, Format::Png, Format::Webp))
            .await
            .unwrap();

        assert!(output.to_string_lossy().ends_with("output.webp"));
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_missing_input() {
        let temp = tempfile::tempdir().unwrap();
        let converter = ImageConverter::with_defaults();
        let err = converter
            .convert(request(&temp, Format::Png, Format::Jpg))
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn test_rejects_non_raster_target() {
        let temp = tempfile::tempdir().unwrap();
        write_test_png(&temp.path().join("input.png"));

        let converter = ImageConverter::with_defaults();
        let err = converter
            .convert(request(&temp, Format::Png, Format::Pdf))
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::UnsupportedRoute { .. }));
    }

    #[test]
    fn test_flatten_alpha_blends_toward_white() {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let flat = ImageConverter::flatten_alpha(&DynamicImage::ImageRgba8(img));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    }
}

//! Document converter backed by external tools.
//!
//! LibreOffice handles the word-processing routes, pdftotext the text
//! extraction, and ImageMagick the routes that cross between PDF and
//! raster images. All three run as subprocesses with the same timeout and
//! stderr discipline as the ffmpeg converter.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::format::Format;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::exec::{probe_tool, run_tool, verify_output};
use super::traits::Converter;
use super::types::ConvertRequest;

/// Which tool serves a document route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Soffice,
    Pdftotext,
    Magick,
}

/// Converter for document routes and PDF/raster crossovers.
pub struct DocumentConverter {
    config: ConverterConfig,
}

impl DocumentConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    fn pick_tool(source: Format, target: Format) -> Option<Tool> {
        match (source, target) {
            (Format::Docx, Format::Pdf)
            | (Format::Docx, Format::Txt)
            | (Format::Txt, Format::Pdf)
            | (Format::Pdf, Format::Docx) => Some(Tool::Soffice),
            (Format::Pdf, Format::Txt) => Some(Tool::Pdftotext),
            (Format::Pdf, Format::Jpg) | (Format::Pdf, Format::Png) => Some(Tool::Magick),
            (source, Format::Pdf) if source.category() == crate::format::Category::Image => {
                Some(Tool::Magick)
            }
            _ => None,
        }
    }

    /// LibreOffice writes `<outdir>/<input stem>.<ext>`; there is no flag to
    /// pick the output filename directly.
    fn soffice_output_path(input: &Path, output_dir: &Path, target: Format) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        output_dir.join(format!("{}.{}", stem, target))
    }

    fn build_soffice_args(input: &Path, output_dir: &Path, target: Format) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--convert-to".to_string(),
            target.as_str().to_string(),
            "--outdir".to_string(),
            output_dir.to_string_lossy().to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    fn build_pdftotext_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-enc".to_string(),
            "UTF-8".to_string(),
            input.to_string_lossy().to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn build_magick_args(
        input: &Path,
        output: &Path,
        source: Format,
        density: u32,
    ) -> Vec<String> {
        let mut args = Vec::new();
        if source == Format::Pdf {
            // Density must precede the input to affect rasterization; only
            // the first page is rendered, matching the upload UI's promise.
            args.extend(["-density".to_string(), density.to_string()]);
            args.push(format!("{}[0]", input.to_string_lossy()));
        } else {
            args.push(input.to_string_lossy().to_string());
        }
        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl Converter for DocumentConverter {
    fn name(&self) -> &str {
        "document"
    }

    async fn convert(&self, request: ConvertRequest) -> Result<PathBuf, ConverterError> {
        if !request.input_path.exists() {
            return Err(ConverterError::InputNotFound {
                path: request.input_path.clone(),
            });
        }

        let tool = Self::pick_tool(request.source_format, request.target_format).ok_or(
            ConverterError::UnsupportedRoute {
                from: request.source_format,
                target: request.target_format,
            },
        )?;

        let timeout = self.config.tool_timeout_secs;

        let output_path = match tool {
            Tool::Soffice => {
                let args = Self::build_soffice_args(
                    &request.input_path,
                    &request.output_dir,
                    request.target_format,
                );
                run_tool("soffice", &self.config.soffice_path, &args, timeout).await?;
                Self::soffice_output_path(
                    &request.input_path,
                    &request.output_dir,
                    request.target_format,
                )
            }
            Tool::Pdftotext => {
                let output = request.default_output_path();
                let args = Self::build_pdftotext_args(&request.input_path, &output);
                run_tool("pdftotext", &self.config.pdftotext_path, &args, timeout).await?;
                output
            }
            Tool::Magick => {
                let output = request.default_output_path();
                let args = Self::build_magick_args(
                    &request.input_path,
                    &output,
                    request.source_format,
                    self.config.pdf_density,
                );
                run_tool("magick", &self.config.magick_path, &args, timeout).await?;
                output
            }
        };

        verify_output(&output_path).await?;
        Ok(output_path)
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        probe_tool("soffice", &self.config.soffice_path, "--version").await?;
        probe_tool("pdftotext", &self.config.pdftotext_path, "-v").await?;
        probe_tool("magick", &self.config.magick_path, "-version").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_selection() {
        assert_eq!(
            DocumentConverter::pick_tool(Format::Docx, Format::Pdf),
            Some(Tool::Soffice)
        );
        assert_eq!(
            DocumentConverter::pick_tool(Format::Pdf, Format::Txt),
            Some(Tool::Pdftotext)
        );
        assert_eq!(
            DocumentConverter::pick_tool(Format::Pdf, Format::Png),
            Some(Tool::Magick)
        );
        assert_eq!(
            DocumentConverter::pick_tool(Format::Webp, Format::Pdf),
            Some(Tool::Magick)
        );
        assert_eq!(DocumentConverter::pick_tool(Format::Mp4, Format::Gif), None);
    }

    #[test]
    fn test_soffice_output_path_uses_input_stem() {
        let path = DocumentConverter::soffice_output_path(
            Path::new("/scratch/report.final.docx"),
            Path::new("/scratch/out"),
            Format::Pdf,
        );
        assert_eq!(path, PathBuf::from("/scratch/out/report.final.pdf"));
    }

    #[test]
    fn test_soffice_args() {
        let args = DocumentConverter::build_soffice_args(
            Path::new("/in/report.docx"),
            Path::new("/out"),
            Format::Pdf,
        );
        assert_eq!(args[0], "--headless");
        assert!(args.contains(&"pdf".to_string()));
        assert!(args.contains(&"/out".to_string()));
        assert_eq!(args.last().unwrap(), "/in/report.docx");
    }

    #[test]
    fn test_magick_args_for_pdf_source() {
        let args = DocumentConverter::build_magick_args(
            Path::new("/in/doc.pdf"),
            Path::new("/out/output.png"),
            Format::Pdf,
            200,
        );
        assert_eq!(args[0], "-density");
        assert_eq!(args[1], "200");
        assert_eq!(args[2], "/in/doc.pdf[0]");
    }

    #[test]
    fn test_magick_args_for_image_source() {
        let args = DocumentConverter::build_magick_args(
            Path::new("/in/photo.jpg"),
            Path::new("/out/output.pdf"),
            Format::Jpg,
            200,
        );
        assert_eq!(args, vec!["/in/photo.jpg", "/out/output.pdf"]);
    }

    #[tokio::test]
    async fn test_unsupported_route_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("clip.mp4");
        tokio::fs::write(&input, b"x").await.unwrap();

        let converter = DocumentConverter::with_defaults();
        let err = converter
            .convert(ConvertRequest {
                job_id: "t".to_string(),
                input_path: input,
                source_format: Format::Mp4,
                target_format: Format::Gif,
                output_dir: temp.path().to_path_buf(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::UnsupportedRoute { .. }));
    }
}

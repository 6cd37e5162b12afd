//! FFmpeg-based video converter.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::format::Format;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::exec::{probe_tool, run_tool, verify_output};
use super::traits::Converter;
use super::types::ConvertRequest;

/// Converter for video transcodes and video-to-GIF, backed by an ffmpeg
/// subprocess.
pub struct FfmpegConverter {
    config: ConverterConfig,
}

impl FfmpegConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    /// Builds the ffmpeg argument list for a transcode.
    fn build_transcode_args(input: &Path, output: &Path, target: Format) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];

        match target {
            Format::Mp4 => {
                args.extend([
                    "-c:v".to_string(),
                    "libx264".to_string(),
                    "-c:a".to_string(),
                    "aac".to_string(),
                    // Required for streaming-friendly mp4 output
                    "-movflags".to_string(),
                    "+faststart".to_string(),
                ]);
            }
            Format::Avi => {
                args.extend([
                    "-c:v".to_string(),
                    "mpeg4".to_string(),
                    "-c:a".to_string(),
                    "libmp3lame".to_string(),
                ]);
            }
            _ => {}
        }

        args.extend(["-loglevel".to_string(), "error".to_string()]);
        args.push(output.to_string_lossy().to_string());
        args
    }

    /// Builds the ffmpeg argument list for a GIF render.
    ///
    /// Uses the two-pass palette filter so the GIF does not fall back to the
    /// generic 256-color palette, capped in duration and width.
    fn build_gif_args(
        input: &Path,
        output: &Path,
        max_duration_secs: u32,
        max_width: u32,
    ) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-t".to_string(),
            max_duration_secs.to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            format!(
                "[0:v] fps=10,scale='min({},iw)':-1:flags=lanczos,split [a][b];\
                 [a] palettegen [p];[b][p] paletteuse",
                max_width
            ),
            "-loglevel".to_string(),
            "error".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn convert(&self, request: ConvertRequest) -> Result<PathBuf, ConverterError> {
        if !request.input_path.exists() {
            return Err(ConverterError::InputNotFound {
                path: request.input_path.clone(),
            });
        }

        let output_path = request.default_output_path();

        let args = match request.target_format {
            Format::Gif => Self::build_gif_args(
                &request.input_path,
                &output_path,
                self.config.gif_max_duration_secs,
                self.config.gif_max_width,
            ),
            Format::Mp4 | Format::Avi | Format::Mov | Format::Mkv => {
                Self::build_transcode_args(&request.input_path, &output_path, request.target_format)
            }
            _ => {
                return Err(ConverterError::UnsupportedRoute {
                    from: request.source_format,
                    target: request.target_format,
                });
            }
        };

        run_tool(
            "ffmpeg",
            &self.config.ffmpeg_path,
            &args,
            self.config.tool_timeout_secs,
        )
        .await?;

        verify_output(&output_path).await?;
        Ok(output_path)
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        probe_tool("ffmpeg", &self.config.ffmpeg_path, "-version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_args_for_mp4() {
        let args = FfmpegConverter::build_transcode_args(
            Path::new("/in/clip.avi"),
            Path::new("/out/output.mp4"),
            Format::Mp4,
        );
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert_eq!(args.last().unwrap(), "/out/output.mp4");
    }

    #[test]
    fn test_transcode_args_for_avi() {
        let args = FfmpegConverter::build_transcode_args(
            Path::new("/in/clip.mp4"),
            Path::new("/out/output.avi"),
            Format::Avi,
        );
        assert!(args.contains(&"mpeg4".to_string()));
        assert!(!args.contains(&"libx264".to_string()));
    }

    #[test]
    fn test_gif_args_cap_duration_and_width() {
        let args = FfmpegConverter::build_gif_args(
            Path::new("/in/clip.mp4"),
            Path::new("/out/output.gif"),
            10,
            480,
        );
        let t_idx = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t_idx + 1], "10");
        let filter = args
            .iter()
            .find(|a| a.contains("palettegen"))
            .expect("palette filter present");
        assert!(filter.contains("min(480,iw)"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_capability_unavailable() {
        let config = ConverterConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ..Default::default()
        };
        let converter = FfmpegConverter::new(config);
        let err = converter.validate().await.unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_rejects_non_video_target() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("clip.mp4");
        tokio::fs::write(&input, b"not really a video").await.unwrap();

        let converter = FfmpegConverter::with_defaults();
        let err = converter
            .convert(ConvertRequest {
                job_id: "t".to_string(),
                input_path: input,
                source_format: Format::Mp4,
                target_format: Format::Pdf,
                output_dir: temp.path().to_path_buf(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::UnsupportedRoute { .. }));
    }
}

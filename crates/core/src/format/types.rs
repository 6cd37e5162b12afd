//! Format tags and related enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from format parsing and route resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The format tag is not one we know about.
    #[error("Unrecognized format: {value}")]
    UnknownFormat { value: String },

    /// The (source, target) pair has no route in the conversion table.
    #[error("Conversion from {from} to {target} is not supported")]
    UnsupportedConversion { from: Format, target: Format },
}

/// A known file format tag.
///
/// Tags are matched case-insensitively on input and always rendered
/// lowercase. `jpg` and `jpeg` are kept distinct because they appear as
/// distinct extensions on uploads and in route declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Jpg,
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Tiff,
    Pdf,
    Docx,
    Txt,
    Mp4,
    Avi,
    Mov,
    Mkv,
}

impl Format {
    /// All known formats, in declaration order.
    pub const ALL: &'static [Format] = &[
        Format::Jpg,
        Format::Jpeg,
        Format::Png,
        Format::Gif,
        Format::Bmp,
        Format::Webp,
        Format::Tiff,
        Format::Pdf,
        Format::Docx,
        Format::Txt,
        Format::Mp4,
        Format::Avi,
        Format::Mov,
        Format::Mkv,
    ];

    /// Parses a format tag, case-insensitively.
    pub fn parse(value: &str) -> Result<Self, FormatError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "jpg" => Ok(Format::Jpg),
            "jpeg" => Ok(Format::Jpeg),
            "png" => Ok(Format::Png),
            "gif" => Ok(Format::Gif),
            "bmp" => Ok(Format::Bmp),
            "webp" => Ok(Format::Webp),
            "tiff" => Ok(Format::Tiff),
            "pdf" => Ok(Format::Pdf),
            "docx" => Ok(Format::Docx),
            "txt" => Ok(Format::Txt),
            "mp4" => Ok(Format::Mp4),
            "avi" => Ok(Format::Avi),
            "mov" => Ok(Format::Mov),
            "mkv" => Ok(Format::Mkv),
            _ => Err(FormatError::UnknownFormat {
                value: value.to_string(),
            }),
        }
    }

    /// The lowercase tag, which doubles as the file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Jpg => "jpg",
            Format::Jpeg => "jpeg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::Bmp => "bmp",
            Format::Webp => "webp",
            Format::Tiff => "tiff",
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Txt => "txt",
            Format::Mp4 => "mp4",
            Format::Avi => "avi",
            Format::Mov => "mov",
            Format::Mkv => "mkv",
        }
    }

    /// The broad category this format belongs to.
    pub fn category(&self) -> Category {
        match self {
            Format::Jpg
            | Format::Jpeg
            | Format::Png
            | Format::Gif
            | Format::Bmp
            | Format::Webp
            | Format::Tiff => Category::Image,
            Format::Pdf | Format::Docx | Format::Txt => Category::Document,
            Format::Mp4 | Format::Avi | Format::Mov | Format::Mkv => Category::Video,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::parse(s)
    }
}

/// Broad conversion category recorded on each job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Document,
    Video,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Image => "image",
            Category::Document => "document",
            Category::Video => "video",
        }
    }

    /// Parses a category tag, case-insensitively.
    pub fn parse(value: &str) -> Result<Self, FormatError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Category::Image),
            "document" => Ok(Category::Document),
            "video" => Ok(Category::Video),
            _ => Err(FormatError::UnknownFormat {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which converter capability serves a route.
///
/// This is not the same thing as [`Category`]: a `jpg -> pdf` route has an
/// image source but is served by the document capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    Image,
    Document,
    Video,
}

impl ConverterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConverterKind::Image => "image",
            ConverterKind::Document => "document",
            ConverterKind::Video => "video",
        }
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Format::parse("JPG").unwrap(), Format::Jpg);
        assert_eq!(Format::parse("Png").unwrap(), Format::Png);
        assert_eq!(Format::parse("  mkv ").unwrap(), Format::Mkv);
    }

    #[test]
    fn test_parse_unknown_format() {
        let err = Format::parse("exe").unwrap_err();
        assert!(matches!(err, FormatError::UnknownFormat { .. }));
    }

    #[test]
    fn test_roundtrip_all_formats() {
        for format in Format::ALL {
            assert_eq!(Format::parse(format.as_str()).unwrap(), *format);
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(Format::Webp.category(), Category::Image);
        assert_eq!(Format::Docx.category(), Category::Document);
        assert_eq!(Format::Mov.category(), Category::Video);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Format::Tiff).unwrap();
        assert_eq!(json, "\"tiff\"");
        let parsed: Format = serde_json::from_str("\"mp4\"").unwrap();
        assert_eq!(parsed, Format::Mp4);
    }
}

//! The static conversion route table.

use super::types::Format::*;
use super::types::{ConverterKind, Format, FormatError};

/// Every supported route, as data.
///
/// Routes that involve a PDF on either side are served by the document
/// capability even when the other side is an image; plain raster-to-raster
/// routes go to the image capability.
const ROUTES: &[((Format, Format), ConverterKind)] = &[
    // Image conversions
    ((Jpg, Png), ConverterKind::Image),
    ((Jpg, Gif), ConverterKind::Image),
    ((Jpg, Bmp), ConverterKind::Image),
    ((Jpg, Webp), ConverterKind::Image),
    ((Jpg, Tiff), ConverterKind::Image),
    ((Jpg, Pdf), ConverterKind::Document),
    ((Jpeg, Png), ConverterKind::Image),
    ((Jpeg, Jpg), ConverterKind::Image),
    ((Jpeg, Pdf), ConverterKind::Document),
    ((Png, Jpg), ConverterKind::Image),
    ((Png, Jpeg), ConverterKind::Image),
    ((Png, Gif), ConverterKind::Image),
    ((Png, Bmp), ConverterKind::Image),
    ((Png, Webp), ConverterKind::Image),
    ((Png, Pdf), ConverterKind::Document),
    ((Gif, Jpg), ConverterKind::Image),
    ((Gif, Png), ConverterKind::Image),
    ((Gif, Pdf), ConverterKind::Document),
    ((Bmp, Jpg), ConverterKind::Image),
    ((Bmp, Png), ConverterKind::Image),
    ((Bmp, Pdf), ConverterKind::Document),
    ((Webp, Jpg), ConverterKind::Image),
    ((Webp, Png), ConverterKind::Image),
    ((Webp, Pdf), ConverterKind::Document),
    ((Tiff, Jpg), ConverterKind::Image),
    ((Tiff, Png), ConverterKind::Image),
    ((Tiff, Pdf), ConverterKind::Document),
    // Document conversions
    ((Pdf, Docx), ConverterKind::Document),
    ((Pdf, Txt), ConverterKind::Document),
    ((Pdf, Jpg), ConverterKind::Document),
    ((Pdf, Png), ConverterKind::Document),
    ((Docx, Pdf), ConverterKind::Document),
    ((Docx, Txt), ConverterKind::Document),
    ((Txt, Pdf), ConverterKind::Document),
    // Video conversions
    ((Mp4, Gif), ConverterKind::Video),
    ((Mp4, Avi), ConverterKind::Video),
    ((Avi, Mp4), ConverterKind::Video),
    ((Mov, Mp4), ConverterKind::Video),
    ((Mkv, Mp4), ConverterKind::Video),
];

/// Read-only lookup over the route table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionTable;

impl ConversionTable {
    pub fn new() -> Self {
        Self
    }

    /// Resolves a route to the converter capability that serves it.
    ///
    /// This runs before any I/O so that an unsupported pair fails with a
    /// deterministic, user-facing error instead of a converter failure.
    pub fn resolve(
        &self,
        source: Format,
        target: Format,
    ) -> Result<ConverterKind, FormatError> {
        ROUTES
            .iter()
            .find(|((s, t), _)| *s == source && *t == target)
            .map(|(_, kind)| *kind)
            .ok_or(FormatError::UnsupportedConversion { from: source, target })
    }

    /// Whether the route exists at all.
    pub fn supports(&self, source: Format, target: Format) -> bool {
        self.resolve(source, target).is_ok()
    }

    /// All declared routes, for introspection endpoints.
    pub fn routes(&self) -> impl Iterator<Item = (Format, Format, ConverterKind)> {
        ROUTES.iter().map(|((s, t), k)| (*s, *t, *k))
    }
}

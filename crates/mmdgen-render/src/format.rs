//! Output formats the external renderer can produce.

/// Rendered artifact format, selected by the request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Svg,
    Pdf,
}

impl OutputFormat {
    /// Parse a format from a dot-prefixed extension (`".png"`).
    ///
    /// Matching is exact: `".PNG"` and `"png"` are not diagram requests and
    /// are left to the static file responder.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".png" => Some(Self::Png),
            ".svg" => Some(Self::Svg),
            ".pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Dot-prefixed extension for this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => ".png",
            Self::Svg => ".svg",
            Self::Pdf => ".pdf",
        }
    }
}

//! Request path decomposition.
//!
//! A diagram request path names a logical diagram plus an optional explicit
//! size and an output extension:
//!
//! ```text
//! <logical-name>[.<W>x<H>]<.png|.svg|.pdf>
//! ```
//!
//! Decomposition is a pure string transformation and never touches the
//! filesystem.

/// Explicit output dimensions carried in a request path.
///
/// Both values are kept as the decimal strings from the URL so the artifact
/// file name reproduces the request exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size<'a> {
    pub width: &'a str,
    pub height: &'a str,
}

/// A request path split into its logical parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecomposedPath<'a> {
    /// Path with the extension and size suffix removed.
    pub base: &'a str,
    /// Explicit size, if the path carried a `.<W>x<H>` suffix.
    pub size: Option<Size<'a>>,
    /// Final dot-suffix including the dot, or empty.
    pub extension: &'a str,
}

impl DecomposedPath<'_> {
    /// Rebuild the path this decomposition came from.
    #[must_use]
    pub fn to_path(&self) -> String {
        match self.size {
            Some(size) => format!(
                "{}.{}x{}{}",
                self.base, size.width, size.height, self.extension
            ),
            None => format!("{}{}", self.base, self.extension),
        }
    }
}

/// Split `path` into base, optional size and extension.
///
/// A trailing `.<digits>x<digits>` on the base is consumed as the size; any
/// other suffix (`.xz`, `.10x`, `.+3x4`) stays part of the logical name.
#[must_use]
pub fn decompose(path: &str) -> DecomposedPath<'_> {
    let ext = extension(path);
    let base = &path[..path.len() - ext.len()];

    let size_suffix = extension(base);
    if let Some(size) = size_suffix.strip_prefix('.').and_then(parse_size) {
        return DecomposedPath {
            base: &base[..base.len() - size_suffix.len()],
            size: Some(size),
            extension: ext,
        };
    }

    DecomposedPath {
        base,
        size: None,
        extension: ext,
    }
}

/// Dot-suffix of the final path segment, including the dot.
fn extension(path: &str) -> &str {
    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    path[segment_start..]
        .rfind('.')
        .map_or("", |i| &path[segment_start + i..])
}

/// Parse `<digits>x<digits>`, each side fitting a `u32`.
fn parse_size(s: &str) -> Option<Size<'_>> {
    let (width, height) = s.split_once('x')?;
    (is_decimal(width) && is_decimal(height)).then_some(Size { width, height })
}

/// Plain decimal digits that fit a `u32`.
fn is_decimal(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit()) && s.parse::<u32>().is_ok()
}

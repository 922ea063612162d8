//! Calibre format codes and their MIME types.

/// Media type used when a format code is not in the table.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Book formats with a known MIME type.
///
/// Calibre stores format codes upper-case in the `data` table (`EPUB`,
/// `MOBI`, ...); lookups here ignore case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookFormat {
    /// EPUB format (Electronic Publication).
    Epub,
    /// Kindle formats sharing the Mobipocket container.
    Mobi,
    /// Kindle KF8.
    Azw3,
    /// PDF format (Portable Document Format).
    Pdf,
    /// CBZ format (Comic Book ZIP archive).
    Cbz,
    /// CBR format (Comic Book RAR archive).
    Cbr,
    /// FB2 format (FictionBook).
    Fb2,
    /// Rich text.
    Rtf,
    /// Plain text format.
    Txt,
    /// HTML format.
    Html,
    /// DjVu scans.
    Djvu,
}

impl BookFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            BookFormat::Epub => "application/epub+zip",
            BookFormat::Mobi => "application/x-mobipocket-ebook",
            BookFormat::Azw3 => "application/vnd.amazon.ebook",
            BookFormat::Pdf => "application/pdf",
            BookFormat::Cbz => "application/vnd.comicbook+zip",
            BookFormat::Cbr => "application/vnd.comicbook-rar",
            BookFormat::Fb2 => "application/x-fictionbook+xml",
            BookFormat::Rtf => "application/rtf",
            BookFormat::Txt => "text/plain",
            BookFormat::Html => "text/html",
            BookFormat::Djvu => "image/vnd.djvu",
        }
    }

    /// Look up a Calibre format code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "epub" => Some(BookFormat::Epub),
            "mobi" | "azw" | "prc" => Some(BookFormat::Mobi),
            "azw3" => Some(BookFormat::Azw3),
            "pdf" => Some(BookFormat::Pdf),
            "cbz" => Some(BookFormat::Cbz),
            "cbr" => Some(BookFormat::Cbr),
            "fb2" => Some(BookFormat::Fb2),
            "rtf" => Some(BookFormat::Rtf),
            "txt" => Some(BookFormat::Txt),
            "html" | "htm" => Some(BookFormat::Html),
            "djvu" => Some(BookFormat::Djvu),
            _ => None,
        }
    }
}

/// MIME type for a Calibre format code, falling back to
/// `application/octet-stream` for unknown codes.
pub fn mime_for_code(code: &str) -> &'static str {
    BookFormat::from_code(code)
        .map(|f| f.mime_type())
        .unwrap_or(FALLBACK_MIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_case_insensitive() {
        assert_eq!(BookFormat::from_code("EPUB"), Some(BookFormat::Epub));
        assert_eq!(BookFormat::from_code("Mobi"), Some(BookFormat::Mobi));
        assert_eq!(BookFormat::from_code("azw3"), Some(BookFormat::Azw3));
    }

    #[test]
    fn unknown_code_falls_back_to_octet_stream() {
        assert_eq!(mime_for_code("LIT"), FALLBACK_MIME);
        assert_eq!(mime_for_code(""), FALLBACK_MIME);
        assert_eq!(mime_for_code("epub"), "application/epub+zip");
        assert_eq!(mime_for_code("MOBI"), "application/x-mobipocket-ebook");
    }
}

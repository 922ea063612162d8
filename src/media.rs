//! Files stored next to the catalog: covers, book content and cache
//! validators for them.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use std::fs::Metadata;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Where clients are sent when a book has no cover.
pub const PLACEHOLDER_COVER: &str = "/nocover.jpg";

/// File name of the cover inside each book directory.
pub const COVER_FILE: &str = "cover.jpg";

const PLACEHOLDER_WIDTH: u32 = 300;
const PLACEHOLDER_HEIGHT: u32 = 400;

/// Cover image of a book directory.
pub fn cover_path(library: &Path, book_path: &str) -> PathBuf {
    library.join(book_path).join(COVER_FILE)
}

/// Stored file of one format: `{library}/{book_path}/{name}.{format}`.
pub fn content_path(library: &Path, book_path: &str, name: &str, format: &str) -> PathBuf {
    library
        .join(book_path)
        .join(format!("{}.{}", name, format.to_lowercase()))
}

/// Strong entity tag for a file, derived from its size, mtime and path.
pub fn etag_for(path: &Path, meta: &Metadata) -> String {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}-{}", meta.len(), mtime, path.display()));
    format!("\"{}\"", STANDARD.encode(hasher.finalize()))
}

/// Whether an `If-None-Match` header value matches `etag`.
///
/// Accepts lists, `*`, weak validators and unquoted values.
pub fn etag_matches(header: &str, etag: &str) -> bool {
    let wanted = etag.trim_matches('"');
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*"
            || candidate
                .strip_prefix("W/")
                .unwrap_or(candidate)
                .trim_matches('"')
                == wanted
    })
}

/// `Content-Disposition` for a download, with an ASCII fallback name.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// Render the generic cover served for books without one.
pub fn placeholder_cover() -> Result<Vec<u8>> {
    let (r, g, b) = (72.0_f32, 86.0_f32, 104.0_f32);
    let mut img = RgbImage::new(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);

    for y in 0..PLACEHOLDER_HEIGHT {
        let factor = 1.0 - (y as f32 / PLACEHOLDER_HEIGHT as f32) * 0.3;
        let shade = Rgb([(r * factor) as u8, (g * factor) as u8, (b * factor) as u8]);
        for x in 0..PLACEHOLDER_WIDTH {
            img.put_pixel(x, y, shade);
        }
    }

    let border = Rgb([200, 200, 200]);
    for x in 0..PLACEHOLDER_WIDTH {
        img.put_pixel(x, 0, border);
        img.put_pixel(x, PLACEHOLDER_HEIGHT - 1, border);
    }
    for y in 0..PLACEHOLDER_HEIGHT {
        img.put_pixel(0, y, border);
        img.put_pixel(PLACEHOLDER_WIDTH - 1, y, border);
    }

    let mut jpeg = Vec::new();
    img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn paths_inside_book_directory() {
        let root = Path::new("/books");
        assert_eq!(
            cover_path(root, "Frank Herbert/Dune (1)"),
            PathBuf::from("/books/Frank Herbert/Dune (1)/cover.jpg")
        );
        assert_eq!(
            content_path(root, "Frank Herbert/Dune (1)", "Dune - Frank Herbert", "MOBI"),
            PathBuf::from("/books/Frank Herbert/Dune (1)/Dune - Frank Herbert.mobi")
        );
    }

    #[test]
    fn etag_is_stable_and_content_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        std::fs::write(&path, b"abc").unwrap();

        let first = etag_for(&path, &std::fs::metadata(&path).unwrap());
        let again = etag_for(&path, &std::fs::metadata(&path).unwrap());
        assert_eq!(first, again);
        assert!(first.starts_with('"') && first.ends_with('"'));

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"def").unwrap();
        drop(file);
        let changed = etag_for(&path, &std::fs::metadata(&path).unwrap());
        assert_ne!(first, changed);
    }

    #[test]
    fn if_none_match_forms() {
        let etag = "\"abc=\"";
        assert!(etag_matches("\"abc=\"", etag));
        assert!(etag_matches("abc=", etag));
        assert!(etag_matches("W/\"abc=\"", etag));
        assert!(etag_matches("\"x\", \"abc=\"", etag));
        assert!(etag_matches("*", etag));
        assert!(!etag_matches("\"abd=\"", etag));
    }

    #[test]
    fn disposition_has_ascii_fallback() {
        assert_eq!(
            content_disposition("Dune.epub"),
            "attachment; filename=\"Dune.epub\"; filename*=UTF-8''Dune.epub"
        );
        let header = content_disposition("Les Misérables \"1\".epub");
        assert!(header.contains("filename=\"Les Mis_rables _1_.epub\""));
        assert!(header.contains("filename*=UTF-8''Les%20Mis%C3%A9rables%20%221%22.epub"));
    }

    #[test]
    fn placeholder_is_jpeg() {
        let jpeg = placeholder_cover().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}

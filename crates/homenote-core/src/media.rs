//! File type detection and metadata probing for uploads
//!
//! Only the few header bytes needed are read:
//! - PNG: IHDR width/height (big-endian)
//! - GIF: logical screen size (little-endian)
//! - JPEG: first SOFn segment
//!
//! PDFs are reported with a page count of 1; pages are counted server-side.

use crate::models::FileMetadata;
use std::path::Path;

/// Supported upload kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Png,
    Jpeg,
    Gif,
    Pdf,
}

impl MediaKind {
    /// Detect from magic bytes
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    /// Detect from file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// MIME type sent with the upload
    #[inline]
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Pdf => "application/pdf",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_image(self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

/// Metadata reported when completing an upload
///
/// Images whose size cannot be read report no dimensions.
#[must_use]
pub fn probe_metadata(kind: MediaKind, bytes: &[u8]) -> FileMetadata {
    match kind {
        MediaKind::Pdf => FileMetadata::document(1),
        _ => image_dimensions(kind, bytes)
            .map(|(width, height)| FileMetadata::image(width, height))
            .unwrap_or_default(),
    }
}

/// Width and height of an image
#[must_use]
pub fn image_dimensions(kind: MediaKind, bytes: &[u8]) -> Option<(u32, u32)> {
    match kind {
        MediaKind::Png => png_dimensions(bytes),
        MediaKind::Gif => gif_dimensions(bytes),
        MediaKind::Jpeg => jpeg_dimensions(bytes),
        MediaKind::Pdf => None,
    }
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // Signature (8) + chunk length (4) + "IHDR" (4), then width, height
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes.get(16..20)?.try_into().ok()?);
    let height = u32::from_be_bytes(bytes.get(20..24)?.try_into().ok()?);
    Some((width, height))
}

fn gif_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let width = u16::from_le_bytes(bytes.get(6..8)?.try_into().ok()?);
    let height = u16::from_le_bytes(bytes.get(8..10)?.try_into().ok()?);
    Some((u32::from(width), u32::from(height)))
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    loop {
        // Skip fill bytes before a marker
        while *bytes.get(pos)? == 0xFF && *bytes.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        pos += 2;

        // Standalone markers carry no length
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        // Start of scan or end of image before any frame header
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }

        let len = usize::from(u16::from_be_bytes(bytes.get(pos..pos + 2)?.try_into().ok()?));
        if len < 2 {
            return None;
        }

        let is_frame_header =
            matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame_header {
            // length (2) + precision (1), then height, width
            let height = u16::from_be_bytes(bytes.get(pos + 3..pos + 5)?.try_into().ok()?);
            let width = u16::from_be_bytes(bytes.get(pos + 5..pos + 7)?.try_into().ok()?);
            return Some((u32::from(width), u32::from(height)));
        }

        pos += len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&13_u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    fn jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 with a 4-byte payload
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x06, b'J', b'F', b'I', b'F']);
        // SOF0
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&[0x03; 10]);
        bytes
    }

    #[test]
    fn sniffs_magic_bytes() {
        assert_eq!(MediaKind::sniff(&png(1, 1)), Some(MediaKind::Png));
        assert_eq!(MediaKind::sniff(&jpeg(1, 1)), Some(MediaKind::Jpeg));
        assert_eq!(MediaKind::sniff(b"GIF89a\x01\x00"), Some(MediaKind::Gif));
        assert_eq!(MediaKind::sniff(b"%PDF-1.7"), Some(MediaKind::Pdf));
        assert_eq!(MediaKind::sniff(b"hello"), None);
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(MediaKind::from_path(Path::new("lease.PDF")), Some(MediaKind::Pdf));
        assert_eq!(MediaKind::from_path(Path::new("scan.jpeg")), Some(MediaKind::Jpeg));
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn png_size() {
        assert_eq!(image_dimensions(MediaKind::Png, &png(1280, 720)), Some((1280, 720)));
        assert_eq!(image_dimensions(MediaKind::Png, &png(1, 1)[..20]), None);
    }

    #[test]
    fn gif_size() {
        let gif = b"GIF89a\x40\x01\xF0\x00rest";
        assert_eq!(image_dimensions(MediaKind::Gif, gif), Some((320, 240)));
    }

    #[test]
    fn jpeg_size_after_app_segment() {
        assert_eq!(image_dimensions(MediaKind::Jpeg, &jpeg(4032, 3024)), Some((4032, 3024)));
    }

    #[test]
    fn truncated_jpeg_yields_none() {
        let bytes = jpeg(10, 10);
        assert_eq!(image_dimensions(MediaKind::Jpeg, &bytes[..12]), None);
    }

    #[test]
    fn metadata_per_kind() {
        assert_eq!(probe_metadata(MediaKind::Pdf, b"%PDF-1.4"), FileMetadata::document(1));
        assert_eq!(probe_metadata(MediaKind::Png, &png(3, 4)), FileMetadata::image(3, 4));
        assert_eq!(probe_metadata(MediaKind::Png, b"broken"), FileMetadata::default());
    }
}

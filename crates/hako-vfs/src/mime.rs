//! Content-type sniffing from leading bytes.

/// How many leading bytes a backend should hand to [`sniff`].
pub const SNIFF_LEN: usize = 4100;

/// Magic-number table: (offset, signature, media type).
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xff\xd8\xff", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"BM", "image/bmp"),
    (0, b"\x00\x00\x01\x00", "image/x-icon"),
    (0, b"II*\x00", "image/tiff"),
    (0, b"MM\x00*", "image/tiff"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"{\\rtf", "application/rtf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1f\x8b", "application/gzip"),
    (0, b"BZh", "application/x-bzip2"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (0, b"\xfd7zXZ\x00", "application/x-xz"),
    (0, b"\x28\xb5\x2f\xfd", "application/zstd"),
    (0, b"\x00asm", "application/wasm"),
    (0, b"\x7fELF", "application/x-elf"),
    (0, b"SQLite format 3\x00", "application/x-sqlite3"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"OggS", "audio/ogg"),
    (0, b"fLaC", "audio/x-flac"),
    (0, b"\x1a\x45\xdf\xa3", "video/x-matroska"),
    (0, b"wOFF", "font/woff"),
    (0, b"wOF2", "font/woff2"),
    (257, b"ustar", "application/x-tar"),
];

/// Guess a media type from the first bytes of a file.
///
/// Binary formats are recognized by magic number. Anything else that is
/// non-empty UTF-8 without NUL bytes counts as `text/plain`. Returns `None`
/// when nothing matches, including for empty input.
pub fn sniff(head: &[u8]) -> Option<&'static str> {
    if head.is_empty() {
        return None;
    }

    for &(offset, magic, mime) in SIGNATURES {
        if head.get(offset..offset + magic.len()) == Some(magic) {
            return Some(mime);
        }
    }

    if let Some(mime) = sniff_riff(head).or_else(|| sniff_iso_bmff(head)) {
        return Some(mime);
    }

    if looks_like_text(head) {
        return Some("text/plain");
    }

    None
}

/// RIFF containers carry their real type at offset 8.
fn sniff_riff(head: &[u8]) -> Option<&'static str> {
    if !head.starts_with(b"RIFF") {
        return None;
    }
    match head.get(8..12)? {
        b"WEBP" => Some("image/webp"),
        b"WAVE" => Some("audio/wav"),
        b"AVI " => Some("video/x-msvideo"),
        _ => None,
    }
}

/// ISO base media files: `ftyp` box at offset 4, brand at offset 8.
fn sniff_iso_bmff(head: &[u8]) -> Option<&'static str> {
    if head.get(4..8)? != b"ftyp" {
        return None;
    }
    match head.get(8..12)? {
        b"avif" => Some("image/avif"),
        b"heic" | b"heix" => Some("image/heic"),
        b"qt  " => Some("video/quicktime"),
        b"M4A " => Some("audio/mp4"),
        _ => Some("video/mp4"),
    }
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // The sniff window may cut a multi-byte character in half.
        Err(e) => e.error_len().is_none() && head.len() - e.valid_up_to() < 4,
    }
}

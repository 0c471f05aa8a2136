//! Binary portable pixmap (P6) encoding.
//!
//! Writes 8-bit RGB pixmaps from tightly packed RGB or RGBA source buffers,
//! optionally flipping rows so that bottom-up buffers land top-down on disk.
//! The alpha channel of RGBA input is dropped. A small decoder is included
//! for reading back what the encoder produces.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Magic token for binary RGB pixmaps.
pub const MAGIC: &str = "P6";

/// Maximum channel value written to the header.
pub const MAX_VALUE: u32 = 255;

/// Header text for a `width` x `height` pixmap.
pub fn header(width: usize, height: usize) -> String {
    format!("{MAGIC}\n{width} {height}\n{MAX_VALUE}\n")
}

fn invalid_input(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Repack `pixels` into top-to-bottom RGB rows.
///
/// Destination row `y` is taken from source row `height - 1 - y` when
/// `yflip` is set, otherwise from row `y`.
pub fn pack_rgb(
    pixels: &[u8],
    width: usize,
    height: usize,
    ncomp: usize,
    yflip: bool,
) -> io::Result<Vec<u8>> {
    if ncomp != 3 && ncomp != 4 {
        return Err(invalid_input(format!("unsupported channel count {ncomp}")));
    }
    if width == 0 || height == 0 {
        return Err(invalid_input(format!("empty image {width}x{height}")));
    }
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(ncomp))
        .ok_or_else(|| invalid_input(format!("image {width}x{height}x{ncomp} is too large")))?;
    if pixels.len() != expected {
        return Err(invalid_input(format!(
            "pixel buffer holds {} bytes, expected {expected} ({width}x{height}x{ncomp})",
            pixels.len()
        )));
    }

    let mut data = vec![0u8; width * height * 3];
    for (y, dst_row) in data.chunks_exact_mut(width * 3).enumerate() {
        let src_y = if yflip { height - 1 - y } else { y };
        let src_row = &pixels[src_y * width * ncomp..(src_y + 1) * width * ncomp];
        for (dst, src) in dst_row.chunks_exact_mut(3).zip(src_row.chunks_exact(ncomp)) {
            dst.copy_from_slice(&src[..3]);
        }
    }
    Ok(data)
}

/// Encode a pixmap into `out`.
pub fn encode<W: Write>(
    out: &mut W,
    pixels: &[u8],
    width: usize,
    height: usize,
    ncomp: usize,
    yflip: bool,
) -> io::Result<()> {
    let data = pack_rgb(pixels, width, height, ncomp, yflip)?;
    out.write_all(header(width, height).as_bytes())?;
    out.write_all(&data)?;
    out.flush()
}

/// Encode a pixmap and write it to `path`, replacing any existing file.
///
/// The image is staged next to `path` and renamed into place, so `path`
/// holds either the previous file or the complete new one.
pub fn write_ppm(
    path: impl AsRef<Path>,
    pixels: &[u8],
    width: usize,
    height: usize,
    ncomp: usize,
    yflip: bool,
) -> io::Result<()> {
    // Validate before touching the filesystem so bad input leaves nothing behind.
    let data = pack_rgb(pixels, width, height, ncomp, yflip)?;
    replace_file(path.as_ref(), |out| {
        out.write_all(header(width, height).as_bytes())?;
        out.write_all(&data)
    })
}

/// Sibling path used while `path` is being written.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.part", std::process::id()));
    path.with_file_name(name)
}

fn replace_file<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let staged = staging_path(path);
    let result = (|| {
        let mut out = BufWriter::new(File::create(&staged)?);
        write(&mut out)?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&staged, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&staged);
    }
    result
}

/// A decoded 8-bit RGB pixmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmImage {
    pub width: usize,
    pub height: usize,
    /// Row-major RGB triplets, top row first.
    pub data: Vec<u8>,
}

impl PpmImage {
    /// RGB triplet at column `x`, row `y`.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// One row of RGB bytes.
    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.width * 3..(y + 1) * self.width * 3]
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn skip_space(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'#' {
                while let Some(&c) = self.bytes.get(self.pos) {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> io::Result<&'a [u8]> {
        self.skip_space();
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(invalid_data("truncated header"));
        }
        let bytes = self.bytes;
        Ok(&bytes[start..self.pos])
    }

    fn number(&mut self) -> io::Result<usize> {
        let tok = self.token()?;
        std::str::from_utf8(tok)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| invalid_data("malformed header field"))
    }
}

/// Decode a binary P6 pixmap with a maximum value of 255.
pub fn decode(bytes: &[u8]) -> io::Result<PpmImage> {
    let mut cur = Cursor { bytes, pos: 0 };
    if cur.token()? != MAGIC.as_bytes() {
        return Err(invalid_data("not a binary pixmap"));
    }
    let width = cur.number()?;
    let height = cur.number()?;
    let max = cur.number()?;
    if max != MAX_VALUE as usize {
        return Err(invalid_data(format!("unsupported max value {max}")));
    }
    // Exactly one whitespace byte separates the header from the raster.
    match bytes.get(cur.pos) {
        Some(b) if b.is_ascii_whitespace() => cur.pos += 1,
        _ => return Err(invalid_data("missing raster separator")),
    }

    let size = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| invalid_data(format!("image {width}x{height} is too large")))?;
    let raster = &bytes[cur.pos..];
    if raster.len() != size {
        return Err(invalid_data(format!(
            "raster holds {} bytes, expected {size}",
            raster.len()
        )));
    }
    Ok(PpmImage {
        width,
        height,
        data: raster.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgba(width: usize, height: usize) -> Vec<u8> {
        let mut px = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                px.extend_from_slice(&[x as u8, y as u8, (x + y) as u8, 200]);
            }
        }
        px
    }

    #[test]
    fn test_header_text() {
        assert_eq!(header(1024, 768), "P6\n1024 768\n255\n");
    }

    #[test]
    fn test_two_by_two_exact_bytes() {
        let px: Vec<u8> = vec![
            1, 2, 3, 99, 4, 5, 6, 99, //
            7, 8, 9, 99, 10, 11, 12, 99,
        ];
        let mut out = Vec::new();
        encode(&mut out, &px, 2, 2, 4, false).unwrap();

        let head = header(2, 2);
        assert_eq!(out.len(), head.len() + 2 * 2 * 3);
        assert_eq!(&out[..head.len()], head.as_bytes());
        assert_eq!(&out[head.len()..], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_yflip_reverses_rows() {
        let (w, h) = (5, 4);
        let px = gradient_rgba(w, h);

        let mut plain = Vec::new();
        encode(&mut plain, &px, w, h, 4, false).unwrap();
        let mut flipped = Vec::new();
        encode(&mut flipped, &px, w, h, 4, true).unwrap();

        let plain = decode(&plain).unwrap();
        let flipped = decode(&flipped).unwrap();
        for y in 0..h {
            assert_eq!(flipped.row(y), plain.row(h - 1 - y));
        }
    }

    #[test]
    fn test_rgb_input_passes_through() {
        let px: Vec<u8> = (0..3 * 3 * 3).map(|v| v as u8).collect();
        let mut out = Vec::new();
        encode(&mut out, &px, 3, 3, 3, false).unwrap();
        let img = decode(&out).unwrap();
        assert_eq!(img.data, px);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut out = Vec::new();
        let err = encode(&mut out, &[0u8; 7], 2, 1, 4, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = encode(&mut out, &[0u8; 4], 1, 1, 2, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(out.is_empty());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        let mut out = Vec::new();
        let err = encode(&mut out, &[], 0, 3, 4, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = encode(&mut out, &[], 3, 0, 3, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = encode(&mut out, &[0; 4], usize::MAX, 2, 4, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(out.is_empty());
    }

    #[test]
    fn test_decode_rejects_oversized_header() {
        let bytes = b"P6\n18446744073709551615 18446744073709551615\n255\n\0";
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_decode_skips_comments() {
        let mut bytes = b"P6\n# made by hand\n1 1\n255\n".to_vec();
        bytes.extend_from_slice(&[9, 8, 7]);
        let img = decode(&bytes).unwrap();
        assert_eq!((img.width, img.height), (1, 1));
        assert_eq!(img.pixel(0, 0), [9, 8, 7]);
    }

    #[test]
    fn test_decode_rejects_truncated_raster() {
        let mut bytes = header(2, 2).into_bytes();
        bytes.extend_from_slice(&[0; 5]);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_write_ppm_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let px = gradient_rgba(3, 2);
        write_ppm(temp.path(), &px, 3, 2, 4, true).unwrap();

        let img = decode(&std::fs::read(temp.path()).unwrap()).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        // Bottom source row lands on top.
        assert_eq!(img.pixel(2, 0), [2, 1, 3]);
        assert_eq!(img.pixel(0, 1), [0, 0, 0]);
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ppm");
        let err = replace_file(&path, |out| {
            out.write_all(&[0; 8192])?;
            Err(io::Error::other("disk full"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ppm");
        write_ppm(&path, &gradient_rgba(2, 2), 2, 2, 4, false).unwrap();
        let before = std::fs::read(&path).unwrap();

        assert!(replace_file(&path, |out| {
            out.write_all(b"P6\n")?;
            Err(io::Error::other("interrupted"))
        })
        .is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

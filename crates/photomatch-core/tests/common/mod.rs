#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub const DATE_TIME: u16 = 0x0132;
pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const DATE_TIME_DIGITIZED: u16 = 0x9004;

const ASCII: u16 = 2;
const LONG: u16 = 4;
const EXIF_IFD_POINTER: u16 = 0x8769;

/// Minimal little-endian TIFF carrying ASCII date tags.
/// `DateTime` belongs in IFD0; the other two go in the Exif sub-IFD.
pub fn tiff_with_dates(tags: &[(u16, &str)]) -> Vec<u8> {
    let mut ifd0: Vec<(u16, &str)> = tags.iter().copied().filter(|(t, _)| *t == DATE_TIME).collect();
    let mut exif: Vec<(u16, &str)> = tags.iter().copied().filter(|(t, _)| *t != DATE_TIME).collect();
    ifd0.sort_by_key(|(t, _)| *t);
    exif.sort_by_key(|(t, _)| *t);

    let ifd0_count = ifd0.len() + usize::from(!exif.is_empty());
    let ifd0_size = 2 + 12 * ifd0_count + 4;
    let exif_offset = 8 + ifd0_size;
    let exif_size = if exif.is_empty() { 0 } else { 2 + 12 * exif.len() + 4 };
    let mut data_offset = exif_offset + exif_size;
    let mut data = Vec::new();

    let mut out = Vec::new();
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());

    out.extend_from_slice(&(ifd0_count as u16).to_le_bytes());
    out.extend(ascii_entries(&ifd0, &mut data_offset, &mut data));
    if !exif.is_empty() {
        out.extend_from_slice(&EXIF_IFD_POINTER.to_le_bytes());
        out.extend_from_slice(&LONG.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(exif_offset as u32).to_le_bytes());
    }
    out.extend_from_slice(&0u32.to_le_bytes());

    if !exif.is_empty() {
        out.extend_from_slice(&(exif.len() as u16).to_le_bytes());
        out.extend(ascii_entries(&exif, &mut data_offset, &mut data));
        out.extend_from_slice(&0u32.to_le_bytes());
    }

    out.extend(data);
    out
}

fn ascii_entries(entries: &[(u16, &str)], data_offset: &mut usize, data: &mut Vec<u8>) -> Vec<u8> {
    let mut out = Vec::new();
    for (tag, text) in entries {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&ASCII.to_le_bytes());
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        if bytes.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..bytes.len()].copy_from_slice(&bytes);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&(*data_offset as u32).to_le_bytes());
            *data_offset += bytes.len();
            data.extend(bytes);
        }
    }
    out
}

/// Write an image whose only metadata is `DateTimeOriginal`.
pub fn write_photo(path: &Path, original: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, tiff_with_dates(&[(DATE_TIME_ORIGINAL, original)])).unwrap();
}

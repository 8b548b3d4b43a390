use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::parser::{self, MetadataRecord};

/// PNG file signature (first 8 bytes of any valid PNG)
const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const PNG_READER_CAPACITY: usize = 128 * 1024;
/// Text chunk keywords A1111/Forge write their infotext under.
const PARAMETERS_KEYS: &[&str] = &["parameters", "Parameters"];

/// Extracts all PNG text chunks as key/value pairs.
///
/// Pixel data (IDAT) is skipped, never decoded; only chunk headers and text
/// payloads are read.
pub fn extract_text_chunks(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(PNG_READER_CAPACITY, file);
    let mut text_chunks = HashMap::new();

    let mut sig = [0u8; 8];
    if reader.read_exact(&mut sig).is_err() || sig != PNG_SIGNATURE {
        return Err(Error::NotPng(path.to_path_buf()));
    }

    loop {
        let length = match reader.read_u32::<BigEndian>() {
            Ok(len) => len,
            Err(_) => break, // EOF
        };

        let mut chunk_type = [0u8; 4];
        if reader.read_exact(&mut chunk_type).is_err() {
            break;
        }

        match &chunk_type {
            b"tEXt" | b"zTXt" | b"iTXt" => {
                let mut data = vec![0u8; length as usize];
                reader.read_exact(&mut data)?;
                reader.seek(SeekFrom::Current(4))?; // Skip CRC

                let maybe_pair = match &chunk_type {
                    b"tEXt" => parse_text_chunk_pair(&data),
                    b"zTXt" => parse_ztxt_chunk_pair(&data),
                    _ => parse_itxt_chunk_pair(&data),
                };

                if let Some((key, value)) = maybe_pair {
                    text_chunks.insert(key, value);
                }
            }
            b"IEND" => break,
            _ => {
                reader.seek(SeekFrom::Current(length as i64 + 4))?;
            }
        }
    }

    Ok(text_chunks)
}

pub(crate) fn is_png_path(path: &Path) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|value| value.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
}

/// Reads the raw infotext (`parameters` chunk) of a PNG file.
///
/// Returns `Ok(None)` for non-PNG paths and PNGs without the chunk.
pub fn read_parameters(path: &Path) -> Result<Option<String>> {
    if !is_png_path(path) {
        return Ok(None);
    }

    let chunks = extract_text_chunks(path)?;
    Ok(PARAMETERS_KEYS
        .iter()
        .find_map(|key| chunks.get(*key))
        .cloned())
}

/// Reads and parses the infotext of a PNG file.
///
/// `Ok(None)` when the file carries no A1111/Forge generation parameters.
pub fn extract_metadata_from_file(path: &Path) -> Result<Option<MetadataRecord>> {
    let raw = read_parameters(path)?;
    Ok(parser::extract_metadata(raw.as_deref()))
}

fn parse_text_chunk_pair(data: &[u8]) -> Option<(String, String)> {
    let null_pos = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8(data[..null_pos].to_vec()).ok()?;
    // tEXt is Latin-1 on paper; A1111 writes UTF-8 and some tools write neither.
    let value = match String::from_utf8(data[null_pos + 1..].to_vec()) {
        Ok(value) => value,
        Err(_) => data[null_pos + 1..].iter().map(|&b| b as char).collect(),
    };
    Some((keyword, value))
}

fn parse_ztxt_chunk_pair(data: &[u8]) -> Option<(String, String)> {
    let null_pos = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8(data[..null_pos].to_vec()).ok()?;

    let mut cursor = null_pos + 1;
    if cursor >= data.len() {
        return None;
    }

    let compression_method = data[cursor];
    cursor += 1;
    if compression_method != 0 {
        return None;
    }

    // Some tools include an extra separator byte before payload; tolerate it.
    if cursor < data.len() && data[cursor] == 0 {
        cursor += 1;
    }

    let value = decompress_zlib_to_string(&data[cursor..])?;
    Some((keyword, value))
}

fn parse_itxt_chunk_pair(data: &[u8]) -> Option<(String, String)> {
    let null_pos = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8(data[..null_pos].to_vec()).ok()?;

    let rest = &data[null_pos + 1..];
    if rest.len() < 2 {
        return None;
    }

    let compression_flag = rest[0];
    let compression_method = rest[1];
    if compression_flag != 0 && compression_flag != 1 {
        return None;
    }

    let after_compression = &rest[2..];
    let lang_end = after_compression.iter().position(|&b| b == 0)?;
    let after_lang = &after_compression[lang_end + 1..];
    let translated_end = after_lang.iter().position(|&b| b == 0)?;
    let text = &after_lang[translated_end + 1..];

    if compression_flag == 1 {
        if compression_method != 0 {
            return None;
        }
        let value = decompress_zlib_to_string(text)?;
        return Some((keyword, value));
    }

    let value = String::from_utf8(text.to_vec()).ok()?;
    Some((keyword, value))
}

fn decompress_zlib_to_string(data: &[u8]) -> Option<String> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = String::new();
    decoder.read_to_string(&mut output).ok()?;
    Some(output)
}

/// Recursively collects PNG files under `dir`, sorted by path.
pub fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(false)
        .max_open(32)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry under {}: {}", dir.display(), err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_png_path(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    paths
}

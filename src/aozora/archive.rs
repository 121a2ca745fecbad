//! ZIP extraction and Shift_JIS decoding of Aozora Bunko archives.

use crate::error::LoaderError;
use encoding_rs::SHIFT_JIS;
use std::io::{Cursor, Read};
use tracing::{debug, warn};

/// Upper bound for preallocating a member from its declared size.
const MAX_SIZE_HINT: u64 = 16 * 1024 * 1024;

/// Substitute for byte sequences that are not valid Shift_JIS.
pub const REPLACEMENT_CHARACTER: char = '\u{fffd}';

/// The text member of an archive, still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Member name inside the archive.
    pub name: String,

    pub bytes: Vec<u8>,
}

/// Decoded text and how many malformed sequences were replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub replaced: usize,
}

/// Returns the first `.txt` member of a ZIP archive.
///
/// Other members (illustrations, directories) are skipped.
pub fn extract_text_entry(zip_bytes: &[u8], archive_name: &str) -> Result<ArchiveEntry, LoaderError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes))?;

    let mut text_names = Vec::new();
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        if !file.is_dir() && is_text_member(file.name()) {
            text_names.push(file.name().to_string());
        }
    }

    let name = text_names
        .first()
        .cloned()
        .ok_or_else(|| LoaderError::TextFileNotFound {
            archive: archive_name.to_string(),
        })?;

    if text_names.len() > 1 {
        warn!(
            archive = archive_name,
            members = ?text_names,
            "More than one text file found, taking the first one"
        );
    }

    let mut file = archive.by_name(&name)?;
    let mut bytes = Vec::with_capacity(size_hint(file.size()));
    file.read_to_end(&mut bytes)?;

    debug!(archive = archive_name, member = %name, size = bytes.len(), "Extracted text member");

    Ok(ArchiveEntry { name, bytes })
}

/// Capacity to reserve for a member; the declared size is not trusted.
fn size_hint(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_SIZE_HINT)).unwrap_or(0)
}

fn is_text_member(name: &str) -> bool {
    name.to_lowercase().ends_with(".txt")
}

/// Decodes Shift_JIS bytes.
///
/// Malformed sequences are replaced with U+FFFD and counted. Decoding only
/// fails when non-empty input yields nothing but replacements and whitespace.
pub fn decode_shift_jis(bytes: &[u8]) -> Result<Decoded, LoaderError> {
    let (text, _, had_errors) = SHIFT_JIS.decode(bytes);

    let replaced = if had_errors {
        text.chars().filter(|&c| c == REPLACEMENT_CHARACTER).count()
    } else {
        0
    };

    if replaced > 0 {
        let has_content = text
            .chars()
            .any(|c| c != REPLACEMENT_CHARACTER && !c.is_whitespace());
        if !has_content {
            return Err(LoaderError::Decode(format!(
                "no valid Shift_JIS text in {} bytes",
                bytes.len()
            )));
        }

        warn!(replaced, "Replaced malformed Shift_JIS sequences");
    }

    Ok(Decoded {
        text: text.into_owned(),
        replaced,
    })
}

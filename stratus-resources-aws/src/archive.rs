use std::io::{Cursor, Write};

use base64::engine::{general_purpose::STANDARD, Engine};
use stratus_resource::error::ProviderError;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Largest archive that can be uploaded inline with a function.
pub const MAX_ARCHIVE_SIZE: usize = 50 * 1024 * 1024;

/// Packs `content` as the single file `file_name` of a zip archive and
/// returns the archive base64 encoded.
pub fn zip_in_memory(file_name: &str, content: &str) -> Result<String, ProviderError> {
    zip_in_memory_with_limit(file_name, content, MAX_ARCHIVE_SIZE)
}

pub fn zip_in_memory_with_limit(
    file_name: &str,
    content: &str,
    max_size: usize,
) -> Result<String, ProviderError> {
    let archive_error = |e: &dyn std::fmt::Display| {
        ProviderError::UnsupportedConfiguration(format!(
            "failed to archive inline code as {}: {}",
            file_name, e
        ))
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(file_name, options)
            .map_err(|e| archive_error(&e))?;
        zip.write_all(content.as_bytes())
            .map_err(|e| archive_error(&e))?;
        zip.finish().map_err(|e| archive_error(&e))?;
    }

    let bytes = buffer.into_inner();
    if bytes.len() > max_size {
        return Err(ProviderError::UnsupportedConfiguration(format!(
            "inline code archive is {} bytes, larger than the {} byte limit",
            bytes.len(),
            max_size
        )));
    }
    Ok(STANDARD.encode(bytes))
}

//! Minimal RIFF chunk walker. SF2 nests `LIST` chunks one level deep
//! (`RIFF/sfbk` → `LIST/INFO`, `LIST/sdta`, `LIST/pdta`), so this does not
//! attempt a general-purpose recursive RIFF reader.

use crate::error::{Error, Result};

pub struct Chunk<'a> {
    pub id: [u8; 4],
    pub data: &'a [u8],
}

/// Iterate the top-level chunks of a RIFF payload (the bytes after the
/// `RIFF` id, size, and form-type fields have been consumed).
pub fn walk_chunks(mut bytes: &[u8]) -> Result<Vec<Chunk<'_>>> {
    let mut chunks = Vec::new();
    while bytes.len() >= 8 {
        let mut id = [0u8; 4];
        id.copy_from_slice(&bytes[0..4]);
        let size = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let body_end = 8 + size;
        if body_end > bytes.len() {
            return Err(Error::MalformedChunk(format!(
                "chunk '{}' declares {size} bytes but only {} remain",
                String::from_utf8_lossy(&id),
                bytes.len() - 8
            )));
        }
        chunks.push(Chunk {
            id,
            data: &bytes[8..body_end],
        });
        // Chunks are word-aligned: a chunk with odd size is followed by a
        // pad byte not counted in its declared size.
        let padded = body_end + (size & 1);
        bytes = &bytes[padded.min(bytes.len())..];
    }
    Ok(chunks)
}

/// A `LIST` chunk's body starts with its 4-byte form type, followed by
/// ordinary sub-chunks.
pub fn list_form_and_chunks(list_body: &[u8]) -> Result<([u8; 4], Vec<Chunk<'_>>)> {
    if list_body.len() < 4 {
        return Err(Error::MalformedChunk("LIST chunk shorter than its form type".into()));
    }
    let mut form = [0u8; 4];
    form.copy_from_slice(&list_body[0..4]);
    let chunks = walk_chunks(&list_body[4..])?;
    Ok((form, chunks))
}

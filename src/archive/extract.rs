use std::io::Read;

use bytes::Bytes;
use flate2::read::DeflateDecoder;

use crate::error::ArchiveError;
use crate::remote::RemoteFile;

use super::{LOCAL_HEADER_SIGNATURE, LOCAL_HEADER_SIZE, METHOD_DEFLATE, METHOD_STORED, Member};

/// Payload of one extracted member, ready for re-packaging
#[derive(Debug)]
pub enum MemberData {
    /// Fully decoded file contents
    Plain(Vec<u8>),
    /// Raw compressed bytes carried through untouched (encrypted members and
    /// methods this service does not decode)
    Passthrough(Bytes),
}

/// Compute where a member's compressed payload begins.
///
/// The local header carries its own name/extra lengths, which can differ
/// from the directory's values, so it has to be read before the payload
/// offset is known.
pub async fn payload_start(file: &RemoteFile, member: &Member) -> Result<u64, ArchiveError> {
    let offset = member.local_header_offset as u64;
    let header = file.read_range(offset, LOCAL_HEADER_SIZE as u64).await?;
    let (name_len, extra_len) =
        local_header_lengths(&header).ok_or(ArchiveError::LocalHeaderCorrupt(offset))?;
    Ok(offset + LOCAL_HEADER_SIZE as u64 + name_len as u64 + extra_len as u64)
}

/// Parse the name and extra-field lengths out of a 30-byte local header
fn local_header_lengths(header: &[u8]) -> Option<(u16, u16)> {
    if header.len() < LOCAL_HEADER_SIZE || !header.starts_with(&LOCAL_HEADER_SIGNATURE) {
        return None;
    }
    let name_len = u16::from_le_bytes([header[26], header[27]]);
    let extra_len = u16::from_le_bytes([header[28], header[29]]);
    Some((name_len, extra_len))
}

/// Fetch one member's payload and decode it according to its method
pub async fn extract_member(
    file: &RemoteFile,
    member: &Member,
) -> Result<MemberData, ArchiveError> {
    let start = payload_start(file, member).await?;
    let compressed = file
        .read_range(start, member.compressed_size as u64)
        .await?;
    if compressed.len() as u64 != member.compressed_size as u64 {
        return Err(ArchiveError::PayloadSizeMismatch {
            expected: member.compressed_size as u64,
            actual: compressed.len() as u64,
        });
    }

    // Encrypted payloads are never decoded here; they travel as-is so
    // password-aware consumers can still open them
    if member.is_encrypted() {
        return Ok(MemberData::Passthrough(compressed));
    }

    match member.method {
        METHOD_STORED => decode_stored(compressed, member.uncompressed_size),
        METHOD_DEFLATE => decode_deflate(&compressed, member.uncompressed_size),
        _ => Ok(MemberData::Passthrough(compressed)),
    }
}

fn decode_stored(data: Bytes, expected: u32) -> Result<MemberData, ArchiveError> {
    if data.len() as u64 != expected as u64 {
        return Err(ArchiveError::PayloadSizeMismatch {
            expected: expected as u64,
            actual: data.len() as u64,
        });
    }
    Ok(MemberData::Plain(data.to_vec()))
}

/// Inflate a raw deflate stream whose output size is known up front. Reads
/// are capped one byte past the expected size so a lying stream cannot
/// balloon memory.
fn decode_deflate(data: &[u8], expected: u32) -> Result<MemberData, ArchiveError> {
    let mut decoder = DeflateDecoder::new(data).take(expected as u64 + 1);
    let mut plain = Vec::with_capacity(expected as usize);
    if decoder.read_to_end(&mut plain).is_err() || plain.len() as u64 != expected as u64 {
        return Err(ArchiveError::DecompressMismatch {
            expected: expected as u64,
            actual: plain.len() as u64,
        });
    }
    Ok(MemberData::Plain(plain))
}

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};
use flate2::Compression;
use flate2::write::DeflateEncoder;

use crate::error::ArchiveError;

use super::extract::MemberData;
use super::{
    CDFH_SIGNATURE, EOCD_SIGNATURE, FLAG_DATA_DESCRIPTOR, FLAG_UTF8, LOCAL_HEADER_SIGNATURE,
    LOCAL_HEADER_SIZE, METHOD_DEFLATE, METHOD_STORED, Member,
};

// Zip format spec:
// https://pkware.cachefly.net/webdocs/casestudies/APPNOTE.TXT
const VERSION_NEEDED: u16 = 20;
/// "version made by": zip spec 2.0, host system unix
const VERSION_MADE_BY: u16 = 20 | (3 << 8);
/// -rw-r--r-- regular file
const EXTERNAL_ATTRS: u32 = 0x81A4_0000;

/// Assembles an output archive entry by entry.
///
/// Each added member yields one wire chunk holding its local header and
/// payload; `finish` yields the closing chunk with the central directory and
/// EOCD. The concatenation of all chunks, in order, is a complete archive,
/// so chunks can be streamed to the client as they are produced.
pub struct ZipAssembler {
    entries: Vec<CdEntry>,
    offset: u64,
}

struct CdEntry {
    name: Vec<u8>,
    gp_flag: u16,
    method: u16,
    mod_time: u16,
    mod_date: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u64,
}

impl Default for ZipAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipAssembler {
    pub fn new() -> Self {
        ZipAssembler {
            entries: Vec::new(),
            offset: 0,
        }
    }

    pub fn member_count(&self) -> usize {
        self.entries.len()
    }

    /// Append one member and return its wire chunk.
    ///
    /// Decoded payloads are re-compressed with deflate (empty ones are
    /// stored). Passthrough payloads keep the original method, CRC, sizes,
    /// and flags so the entry stays openable by consumers that understand
    /// it; only the data-descriptor bit is dropped since sizes are written
    /// inline.
    pub fn add_member(
        &mut self,
        member: &Member,
        data: MemberData,
    ) -> Result<Bytes, ArchiveError> {
        let entry = match data {
            MemberData::Plain(plain) => {
                let crc32 = crc32fast::hash(&plain);
                let (method, payload) = if plain.is_empty() {
                    (METHOD_STORED, Vec::new())
                } else {
                    (METHOD_DEFLATE, deflate(&plain)?)
                };
                PendingEntry {
                    gp_flag: member.gp_flag & FLAG_UTF8,
                    method,
                    crc32,
                    uncompressed_size: plain.len() as u32,
                    payload,
                }
            }
            MemberData::Passthrough(raw) => PendingEntry {
                gp_flag: member.gp_flag & !FLAG_DATA_DESCRIPTOR,
                method: member.method,
                crc32: member.crc32,
                uncompressed_size: member.uncompressed_size,
                payload: raw.to_vec(),
            },
        };

        let cd_entry = CdEntry {
            name: member.name_raw.clone(),
            gp_flag: entry.gp_flag,
            method: entry.method,
            mod_time: member.mod_time,
            mod_date: member.mod_date,
            crc32: entry.crc32,
            compressed_size: entry.payload.len() as u32,
            uncompressed_size: entry.uncompressed_size,
            local_header_offset: self.offset,
        };

        let mut chunk =
            BytesMut::with_capacity(LOCAL_HEADER_SIZE + cd_entry.name.len() + entry.payload.len());
        put_local_header(&mut chunk, &cd_entry);
        chunk.put_slice(&entry.payload);

        self.offset += chunk.len() as u64;
        self.entries.push(cd_entry);

        Ok(chunk.freeze())
    }

    /// Emit the central directory and EOCD closing the archive
    pub fn finish(self) -> Bytes {
        let cd_offset = self.offset;
        let mut buf = BytesMut::new();

        for entry in &self.entries {
            put_cd_entry(&mut buf, entry);
        }
        let cd_size = buf.len() as u32;

        buf.put_slice(&EOCD_SIGNATURE);
        buf.put_u16_le(0); // disk number
        buf.put_u16_le(0); // disk with directory start
        buf.put_u16_le(self.entries.len() as u16);
        buf.put_u16_le(self.entries.len() as u16);
        buf.put_u32_le(cd_size);
        buf.put_u32_le(cd_offset as u32);
        buf.put_u16_le(0); // comment length

        buf.freeze()
    }
}

struct PendingEntry {
    gp_flag: u16,
    method: u16,
    crc32: u32,
    uncompressed_size: u32,
    payload: Vec<u8>,
}

fn put_local_header(buf: &mut BytesMut, entry: &CdEntry) {
    buf.put_slice(&LOCAL_HEADER_SIGNATURE);
    buf.put_u16_le(VERSION_NEEDED);
    buf.put_u16_le(entry.gp_flag);
    buf.put_u16_le(entry.method);
    buf.put_u16_le(entry.mod_time);
    buf.put_u16_le(entry.mod_date);
    buf.put_u32_le(entry.crc32);
    buf.put_u32_le(entry.compressed_size);
    buf.put_u32_le(entry.uncompressed_size);
    buf.put_u16_le(entry.name.len() as u16);
    buf.put_u16_le(0); // extra field length
    buf.put_slice(&entry.name);
}

fn put_cd_entry(buf: &mut BytesMut, entry: &CdEntry) {
    buf.put_slice(&CDFH_SIGNATURE);
    buf.put_u16_le(VERSION_MADE_BY);
    buf.put_u16_le(VERSION_NEEDED);
    buf.put_u16_le(entry.gp_flag);
    buf.put_u16_le(entry.method);
    buf.put_u16_le(entry.mod_time);
    buf.put_u16_le(entry.mod_date);
    buf.put_u32_le(entry.crc32);
    buf.put_u32_le(entry.compressed_size);
    buf.put_u32_le(entry.uncompressed_size);
    buf.put_u16_le(entry.name.len() as u16);
    buf.put_u16_le(0); // extra field length
    buf.put_u16_le(0); // comment length
    buf.put_u16_le(0); // disk number start
    buf.put_u16_le(0); // internal attributes
    buf.put_u32_le(EXTERNAL_ATTRS);
    buf.put_u32_le(entry.local_header_offset as u32);
    buf.put_slice(&entry.name);
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(data.len() / 2 + 16),
        Compression::default(),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub mod extract;
pub mod reader;
pub mod writer;

/// Minimum size for EOCD (4 bytes signature + 18 bytes data)
pub const EOCD_MIN_SIZE: usize = 22;

/// The EOCD may be preceded by an archive comment of up to 65535 bytes, so
/// the trailer search window is the EOCD itself plus the maximum comment.
pub const EOCD_SEARCH_WINDOW: u64 = EOCD_MIN_SIZE as u64 + 65536;

/// Central Directory File Header fixed portion
pub const CDFH_SIZE: usize = 46;

/// Local File Header fixed portion
pub const LOCAL_HEADER_SIZE: usize = 30;

pub const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
pub const CDFH_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
pub const LOCAL_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// ZIP compression methods
pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

/// General purpose flag bit 0: the member payload is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// General purpose flag bit 3: sizes live in a trailing data descriptor.
/// Never set on output entries since real sizes are always known up front.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// General purpose flag bit 11: the member name is UTF-8
pub const FLAG_UTF8: u16 = 0x0800;

/// One member of an archive, parsed from its central directory record.
/// Field widths match the on-disk format; offsets are absolute.
#[derive(Debug, Clone)]
pub struct Member {
    /// Name decoded as UTF-8 with replacement of invalid bytes
    pub filename: String,
    /// Name exactly as stored, re-emitted verbatim into output archives
    pub name_raw: Vec<u8>,
    pub method: u16,
    pub gp_flag: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
}

impl Member {
    pub fn is_encrypted(&self) -> bool {
        self.gp_flag & FLAG_ENCRYPTED != 0
    }
}

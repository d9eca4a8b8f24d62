use crate::error::ArchiveError;
use crate::remote::RemoteFile;

use super::{
    CDFH_SIGNATURE, CDFH_SIZE, EOCD_MIN_SIZE, EOCD_SEARCH_WINDOW, EOCD_SIGNATURE,
    LOCAL_HEADER_SIZE, Member,
};

/// Fields of the End of Central Directory record needed to load the directory
#[derive(Debug)]
pub struct Eocd {
    pub entries_total: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

/// Fetch and parse the central directory of a remote archive.
///
/// Costs two ranged reads regardless of archive size: the trailing EOCD
/// window, then the directory itself.
pub async fn read_members(file: &RemoteFile) -> Result<Vec<Member>, ArchiveError> {
    let tail_len = EOCD_SEARCH_WINDOW.min(file.size());
    let tail = file.read_tail(tail_len).await?;
    let eocd = find_eocd(&tail)?;

    let cd_end = eocd.cd_offset as u64 + eocd.cd_size as u64;
    if cd_end > file.size() {
        return Err(ArchiveError::CdCorrupt(format!(
            "directory extends beyond archive bounds (offset {} + size {} > {})",
            eocd.cd_offset,
            eocd.cd_size,
            file.size()
        )));
    }

    let cd_data = file
        .read_range(eocd.cd_offset as u64, eocd.cd_size as u64)
        .await?;
    if cd_data.len() as u64 != eocd.cd_size as u64 {
        return Err(ArchiveError::CdSizeMismatch {
            expected: eocd.cd_size as u64,
            actual: cd_data.len() as u64,
        });
    }

    parse_central_directory(&cd_data, eocd.entries_total, file.size())
}

/// Locate and parse the EOCD record in the trailing buffer.
///
/// The signature can also appear inside member payloads, so the last
/// occurrence in the window wins; a real EOCD always sits after any payload
/// bytes that happen to collide.
pub fn find_eocd(tail: &[u8]) -> Result<Eocd, ArchiveError> {
    let pos = tail
        .windows(4)
        .rposition(|w| w == EOCD_SIGNATURE)
        .ok_or(ArchiveError::EocdNotFound(tail.len() as u64))?;

    if tail.len() - pos < EOCD_MIN_SIZE {
        return Err(ArchiveError::EocdTruncated);
    }
    let eocd = &tail[pos..pos + EOCD_MIN_SIZE];

    let disk_no = u16_at(eocd, 4);
    let cd_start_disk = u16_at(eocd, 6);
    if disk_no != 0 || cd_start_disk != 0 {
        return Err(ArchiveError::Unsupported("multi-disk archives"));
    }

    let entries_total = u16_at(eocd, 10);
    let cd_size = u32_at(eocd, 12);
    let cd_offset = u32_at(eocd, 16);

    // ZIP64 archives store 0xFFFFFFFF here and put the real values in a
    // separate record
    if cd_size == u32::MAX || cd_offset == u32::MAX {
        return Err(ArchiveError::Unsupported("ZIP64 archives"));
    }

    Ok(Eocd {
        entries_total,
        cd_size,
        cd_offset,
    })
}

/// Walk the directory records sequentially into an ordered member list.
///
/// The walk must consume the buffer exactly and yield exactly the advertised
/// number of records; anything else means the directory is malformed.
pub fn parse_central_directory(
    data: &[u8],
    entries_total: u16,
    archive_size: u64,
) -> Result<Vec<Member>, ArchiveError> {
    let mut members = Vec::with_capacity(entries_total as usize);
    let mut pos = 0usize;

    while pos < data.len() {
        if data.len() - pos < CDFH_SIZE || !data[pos..].starts_with(&CDFH_SIGNATURE) {
            return Err(ArchiveError::CdCorrupt(format!(
                "bad file header signature at offset {pos}"
            )));
        }

        let rec = &data[pos..];
        let gp_flag = u16_at(rec, 8);
        let method = u16_at(rec, 10);
        let mod_time = u16_at(rec, 12);
        let mod_date = u16_at(rec, 14);
        let crc32 = u32_at(rec, 16);
        let compressed_size = u32_at(rec, 20);
        let uncompressed_size = u32_at(rec, 24);
        let name_len = u16_at(rec, 28) as usize;
        let extra_len = u16_at(rec, 30) as usize;
        let comment_len = u16_at(rec, 32) as usize;
        let local_header_offset = u32_at(rec, 42);

        if compressed_size == u32::MAX
            || uncompressed_size == u32::MAX
            || local_header_offset == u32::MAX
        {
            return Err(ArchiveError::Unsupported("ZIP64 entries"));
        }

        let record_len = CDFH_SIZE + name_len + extra_len + comment_len;
        if data.len() - pos < record_len {
            return Err(ArchiveError::CdCorrupt(format!(
                "truncated file header at offset {pos}"
            )));
        }

        let name_raw = rec[CDFH_SIZE..CDFH_SIZE + name_len].to_vec();
        let filename = String::from_utf8_lossy(&name_raw).into_owned();

        // The member's payload must fit inside the archive. The directory's
        // name/extra lengths stand in for the local header's, which can
        // differ; the resolver re-reads the real ones before fetching.
        let lho = local_header_offset as u64;
        let member_end =
            lho + (LOCAL_HEADER_SIZE + name_len + extra_len) as u64 + compressed_size as u64;
        if lho >= archive_size || member_end > archive_size {
            return Err(ArchiveError::CdCorrupt(format!(
                "member '{filename}' extends beyond archive bounds"
            )));
        }

        members.push(Member {
            filename,
            name_raw,
            method,
            gp_flag,
            mod_time,
            mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
        });

        pos += record_len;
    }

    if members.len() != entries_total as usize {
        return Err(ArchiveError::CdCorrupt(format!(
            "directory advertised {} entries but contained {}",
            entries_total,
            members.len()
        )));
    }

    Ok(members)
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an EOCD record with the given directory geometry
    fn eocd_record(entries: u16, cd_size: u32, cd_offset: u32) -> Vec<u8> {
        let mut data = vec![0u8; EOCD_MIN_SIZE];
        data[0..4].copy_from_slice(&EOCD_SIGNATURE);
        data[8..10].copy_from_slice(&entries.to_le_bytes());
        data[10..12].copy_from_slice(&entries.to_le_bytes());
        data[12..16].copy_from_slice(&cd_size.to_le_bytes());
        data[16..20].copy_from_slice(&cd_offset.to_le_bytes());
        data
    }

    /// Build a directory record for a member with no extra field or comment
    fn cdfh_record(name: &[u8], method: u16, gp_flag: u16, sizes: (u32, u32), offset: u32) -> Vec<u8> {
        let mut data = vec![0u8; CDFH_SIZE];
        data[0..4].copy_from_slice(&CDFH_SIGNATURE);
        data[8..10].copy_from_slice(&gp_flag.to_le_bytes());
        data[10..12].copy_from_slice(&method.to_le_bytes());
        data[16..20].copy_from_slice(&0x12345678u32.to_le_bytes());
        data[20..24].copy_from_slice(&sizes.0.to_le_bytes());
        data[24..28].copy_from_slice(&sizes.1.to_le_bytes());
        data[28..30].copy_from_slice(&(name.len() as u16).to_le_bytes());
        data[42..46].copy_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(name);
        data
    }

    #[test]
    fn finds_valid_eocd() {
        let mut tail = vec![0u8; 40];
        let record = eocd_record(3, 1000, 5000);
        tail.extend_from_slice(&record);

        let eocd = find_eocd(&tail).expect("should parse");
        assert_eq!(eocd.entries_total, 3);
        assert_eq!(eocd.cd_size, 1000);
        assert_eq!(eocd.cd_offset, 5000);
    }

    #[test]
    fn last_signature_occurrence_wins() {
        // A decoy signature inside payload bytes, then the real record
        let mut tail = Vec::new();
        tail.extend_from_slice(&EOCD_SIGNATURE);
        tail.extend_from_slice(&[0u8; 30]);
        tail.extend_from_slice(&eocd_record(1, 46, 100));

        let eocd = find_eocd(&tail).expect("should parse");
        assert_eq!(eocd.entries_total, 1);
        assert_eq!(eocd.cd_offset, 100);
    }

    #[test]
    fn missing_signature_is_not_found() {
        let tail = vec![0u8; 100];
        let err = find_eocd(&tail).expect_err("must fail");
        assert!(matches!(err, ArchiveError::EocdNotFound(100)));
    }

    #[test]
    fn signature_in_last_21_bytes_is_truncated() {
        let mut tail = vec![0u8; 50];
        let at = tail.len() - 10;
        tail[at..at + 4].copy_from_slice(&EOCD_SIGNATURE);

        let err = find_eocd(&tail).expect_err("must fail");
        assert!(matches!(err, ArchiveError::EocdTruncated));
    }

    #[test]
    fn rejects_multi_disk() {
        let mut record = eocd_record(1, 46, 0);
        record[4..6].copy_from_slice(&1u16.to_le_bytes());

        let err = find_eocd(&record).expect_err("must fail");
        assert!(matches!(err, ArchiveError::Unsupported("multi-disk archives")));
    }

    #[test]
    fn rejects_zip64_sentinel() {
        let record = eocd_record(1, u32::MAX, 0);
        let err = find_eocd(&record).expect_err("must fail");
        assert!(matches!(err, ArchiveError::Unsupported("ZIP64 archives")));
    }

    #[test]
    fn parses_single_entry() {
        let cd = cdfh_record(b"test.txt", 8, 0, (500, 1000), 100);

        let members = parse_central_directory(&cd, 1, 10000).expect("should parse");
        assert_eq!(members.len(), 1);

        let m = &members[0];
        assert_eq!(m.filename, "test.txt");
        assert_eq!(m.method, 8);
        assert_eq!(m.crc32, 0x12345678);
        assert_eq!(m.compressed_size, 500);
        assert_eq!(m.uncompressed_size, 1000);
        assert_eq!(m.local_header_offset, 100);
        assert!(!m.is_encrypted());
    }

    #[test]
    fn preserves_order_across_entries() {
        let mut cd = cdfh_record(b"b.txt", 0, 0, (4, 4), 0);
        cd.extend_from_slice(&cdfh_record(b"a.txt", 0, 0, (4, 4), 50));

        let members = parse_central_directory(&cd, 2, 10000).expect("should parse");
        assert_eq!(members[0].filename, "b.txt");
        assert_eq!(members[1].filename, "a.txt");
    }

    #[test]
    fn invalid_utf8_names_are_replaced() {
        let cd = cdfh_record(&[0x66, 0xFF, 0x6F], 0, 0, (0, 0), 0);

        let members = parse_central_directory(&cd, 1, 10000).expect("should parse");
        assert_eq!(members[0].filename, "f\u{FFFD}o");
        assert_eq!(members[0].name_raw, vec![0x66, 0xFF, 0x6F]);
    }

    #[test]
    fn bad_signature_is_corrupt() {
        let mut cd = cdfh_record(b"ok", 0, 0, (0, 0), 0);
        cd[0] = 0x51;

        let err = parse_central_directory(&cd, 1, 10000).expect_err("must fail");
        assert!(matches!(err, ArchiveError::CdCorrupt(_)));
    }

    #[test]
    fn trailing_garbage_is_corrupt() {
        let mut cd = cdfh_record(b"ok", 0, 0, (0, 0), 0);
        cd.extend_from_slice(&[0u8; 7]);

        let err = parse_central_directory(&cd, 1, 10000).expect_err("must fail");
        assert!(matches!(err, ArchiveError::CdCorrupt(_)));
    }

    #[test]
    fn entry_count_mismatch_is_corrupt() {
        let cd = cdfh_record(b"ok", 0, 0, (0, 0), 0);

        let err = parse_central_directory(&cd, 2, 10000).expect_err("must fail");
        assert!(matches!(err, ArchiveError::CdCorrupt(_)));
    }

    #[test]
    fn member_beyond_archive_bounds_is_corrupt() {
        let cd = cdfh_record(b"big", 0, 0, (500, 500), 900);

        // 900 + 30 + 3 + 500 > 1000
        let err = parse_central_directory(&cd, 1, 1000).expect_err("must fail");
        assert!(matches!(err, ArchiveError::CdCorrupt(_)));
    }

    #[test]
    fn rejects_zip64_entry_sizes() {
        let cd = cdfh_record(b"huge", 8, 0, (u32::MAX, u32::MAX), 0);

        let err = parse_central_directory(&cd, 1, 10000).expect_err("must fail");
        assert!(matches!(err, ArchiveError::Unsupported("ZIP64 entries")));
    }

    #[test]
    fn empty_directory_parses_to_no_members() {
        let members = parse_central_directory(&[], 0, 100).expect("should parse");
        assert!(members.is_empty());
    }
}

//! Zip container access for uploaded app archives.
//!
//! The end-of-central-directory record sits at the tail of the buffer and
//! points at the central directory, which lists every entry. Entry data is
//! decompressed lazily, one entry per call. Archives always arrive fully in
//! memory (blobs are fetched whole), so all reads are slices into the
//! original buffer.

use std::io::Read;

use anyhow::Context;
use byteorder::{LittleEndian, ReadBytesExt};

use super::VfsError;

const EOCD_SIGNATURE: u32 = 0x06054b50;
const EOCD_SIZE: usize = 22;
// Largest trailing comment the format allows
const MAX_COMMENT_SIZE: usize = u16::MAX as usize;

const CD_HEADER_SIGNATURE: u32 = 0x02014b50;
const LOCAL_HEADER_SIGNATURE: u32 = 0x04034b50;
const LOCAL_HEADER_SIZE: usize = 30;

const COMPRESSION_STORE: u16 = 0;
const COMPRESSION_DEFLATE: u16 = 8;

const GPFLAG_ENCRYPTED: u16 = 0x1;

/// One file or directory inside an archive, as recorded by the central
/// directory. Only valid against the buffer it was parsed from.
pub struct ZipEntry {
    pub name: String,
    pub is_dir: bool,
    compression_method: u16,
    general_purpose_bitflag: u16,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
}

#[cfg(test)]
impl ZipEntry {
    pub(crate) fn synthetic(name: &str, is_dir: bool) -> Self {
        Self {
            name: name.to_owned(),
            is_dir,
            compression_method: COMPRESSION_STORE,
            general_purpose_bitflag: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            local_header_offset: 0,
        }
    }
}

struct EocdRecord {
    num_disk: u16,
    num_disk_central_dir_start: u16,
    total_records_this_disk: u16,
    total_records: u16,
    offset_central_dir: u32,
}

pub struct ZipArchive {
    data: Vec<u8>,
    entries: Vec<ZipEntry>,
}

impl ZipArchive {
    pub fn parse(data: Vec<u8>) -> Result<Self, VfsError> {
        let entries = read_central_directory(&data).map_err(VfsError::CorruptArchive)?;
        Ok(Self { data, entries })
    }

    /// Every entry, files and directories, in archive order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn read(&self, entry: &ZipEntry) -> Result<Vec<u8>, VfsError> {
        self.read_inner(entry).map_err(VfsError::Read)
    }

    fn read_inner(&self, entry: &ZipEntry) -> anyhow::Result<Vec<u8>> {
        if (entry.general_purpose_bitflag & GPFLAG_ENCRYPTED) != 0 {
            anyhow::bail!("encrypted entries are not supported");
        }
        let data_start = self.entry_data_offset(entry)?;
        let data_end = data_start
            .checked_add(entry.compressed_size as usize)
            .filter(|&end| end <= self.data.len())
            .context("entry data extends past the end of the archive")?;
        let raw = &self.data[data_start..data_end];
        match entry.compression_method {
            COMPRESSION_STORE => Ok(raw.to_vec()),
            COMPRESSION_DEFLATE => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                flate2::read::DeflateDecoder::new(raw)
                    .read_to_end(&mut out)
                    .context("inflate failed")?;
                Ok(out)
            }
            method => anyhow::bail!("unsupported compression method {method}"),
        }
    }

    // The local header repeats the variable-length name/extra fields with
    // lengths that may differ from the central directory copy, so the data
    // offset has to be computed from the local header itself.
    fn entry_data_offset(&self, entry: &ZipEntry) -> anyhow::Result<usize> {
        let start = entry.local_header_offset as usize;
        let header = self
            .data
            .get(start..start + LOCAL_HEADER_SIZE)
            .context("local file header out of bounds")?;
        let mut view = header;
        if view.read_u32::<LittleEndian>()? != LOCAL_HEADER_SIGNATURE {
            anyhow::bail!("invalid signature for local file header");
        }
        let mut view = &header[26..];
        let name_len = view.read_u16::<LittleEndian>()? as usize;
        let extra_len = view.read_u16::<LittleEndian>()? as usize;
        Ok(start + LOCAL_HEADER_SIZE + name_len + extra_len)
    }
}

fn read_central_directory(data: &[u8]) -> anyhow::Result<Vec<ZipEntry>> {
    let eocd = find_eocd(data)?;
    if eocd.num_disk != eocd.num_disk_central_dir_start
        || eocd.total_records_this_disk != eocd.total_records
    {
        anyhow::bail!("multi-disk zip archive not supported");
    }
    if eocd.num_disk == 0xffff
        || eocd.total_records == 0xffff
        || eocd.offset_central_dir == 0xffff_ffff
    {
        anyhow::bail!("zip64 archive not supported");
    }

    let mut view = data
        .get(eocd.offset_central_dir as usize..)
        .context("central directory offset out of bounds")?;
    let mut entries = Vec::with_capacity(eocd.total_records as usize);
    for _ in 0..eocd.total_records {
        entries.push(parse_central_record(&mut view)?);
    }
    Ok(entries)
}

fn find_eocd(data: &[u8]) -> anyhow::Result<EocdRecord> {
    if data.len() < EOCD_SIZE {
        anyhow::bail!("too small to be a zip archive");
    }

    // Fast path: no trailing comment, record sits exactly at the end
    let tail = &data[data.len() - EOCD_SIZE..];
    if &tail[..4] == EOCD_SIGNATURE.to_le_bytes() && tail[20..22] == [0, 0] {
        return parse_eocd(tail);
    }

    // Otherwise scan backwards across the comment window
    let window_start = data.len().saturating_sub(EOCD_SIZE + MAX_COMMENT_SIZE);
    let window = &data[window_start..];
    for i in (0..=window.len() - EOCD_SIZE).rev() {
        if &window[i..i + 4] != EOCD_SIGNATURE.to_le_bytes() {
            continue;
        }
        let candidate = &window[i..];
        let comment_len = u16::from_le_bytes([candidate[20], candidate[21]]) as usize;
        if comment_len == candidate.len() - EOCD_SIZE {
            return parse_eocd(candidate);
        }
    }
    anyhow::bail!("end of central directory record not found");
}

fn parse_eocd(mut buf: &[u8]) -> anyhow::Result<EocdRecord> {
    if buf.read_u32::<LittleEndian>()? != EOCD_SIGNATURE {
        anyhow::bail!("invalid signature for end of central directory record");
    }
    let num_disk = buf.read_u16::<LittleEndian>()?;
    let num_disk_central_dir_start = buf.read_u16::<LittleEndian>()?;
    let total_records_this_disk = buf.read_u16::<LittleEndian>()?;
    let total_records = buf.read_u16::<LittleEndian>()?;
    let _size_central_dir = buf.read_u32::<LittleEndian>()?;
    let offset_central_dir = buf.read_u32::<LittleEndian>()?;
    Ok(EocdRecord {
        num_disk,
        num_disk_central_dir_start,
        total_records_this_disk,
        total_records,
        offset_central_dir,
    })
}

fn parse_central_record(view: &mut &[u8]) -> anyhow::Result<ZipEntry> {
    if view.read_u32::<LittleEndian>()? != CD_HEADER_SIGNATURE {
        anyhow::bail!("invalid signature for central directory record");
    }
    let _made_by_ver = view.read_u16::<LittleEndian>()?;
    let _min_extract_ver = view.read_u16::<LittleEndian>()?;
    let general_purpose_bitflag = view.read_u16::<LittleEndian>()?;
    let compression_method = view.read_u16::<LittleEndian>()?;
    let _last_modify_time = view.read_u16::<LittleEndian>()?;
    let _last_modify_date = view.read_u16::<LittleEndian>()?;
    let _crc32 = view.read_u32::<LittleEndian>()?;
    let compressed_size = view.read_u32::<LittleEndian>()?;
    let uncompressed_size = view.read_u32::<LittleEndian>()?;
    let name_len = view.read_u16::<LittleEndian>()? as usize;
    let extra_len = view.read_u16::<LittleEndian>()? as usize;
    let comment_len = view.read_u16::<LittleEndian>()? as usize;
    let _num_disk_start = view.read_u16::<LittleEndian>()?;
    let _internal_attrs = view.read_u16::<LittleEndian>()?;
    let _external_attrs = view.read_u32::<LittleEndian>()?;
    let local_header_offset = view.read_u32::<LittleEndian>()?;

    let mut name = vec![0; name_len];
    view.read_exact(&mut name)?;
    let name = String::from_utf8_lossy(&name).into_owned();
    let mut skipped = vec![0; extra_len + comment_len];
    view.read_exact(&mut skipped)?;

    let is_dir = name.ends_with('/');
    Ok(ZipEntry {
        name,
        is_dir,
        compression_method,
        general_purpose_bitflag,
        compressed_size,
        uncompressed_size,
        local_header_offset,
    })
}

//! Reads ZIP structures from any [`ReadAt`] source.
//!
//! ZIP files are read from the end: the End of Central Directory points at
//! the Central Directory, which lists every entry and the offset of its
//! Local File Header. Listing a remote workbook therefore costs two range
//! requests regardless of its size.

use std::io::Cursor;
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Typically used through [`ZipArchive`](super::ZipArchive) rather than
/// directly.
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Locate the End of Central Directory record and its offset.
    ///
    /// Tries the comment-less position first, then scans the last 64 KiB
    /// backwards for a signature whose comment length reaches the end of the
    /// file exactly.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            bail!("Not a valid ZIP file (only {} bytes)", self.size);
        }

        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;
        if let Ok(eocd) = EndOfCentralDirectory::from_bytes(&buf) {
            if eocd.comment_len == 0 {
                return Ok((eocd, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        let candidates = (0..=buf.len() - EndOfCentralDirectory::SIZE).rev();
        for i in candidates {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let eocd = EndOfCentralDirectory::from_bytes(&buf[i..])?;
            if eocd.comment_len as usize == buf.len() - i - EndOfCentralDirectory::SIZE {
                return Ok((eocd, search_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Resolve the central directory, following ZIP64 records when needed.
    pub async fn central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd().await?;
        if !eocd.is_zip64() {
            return Ok(eocd.directory);
        }

        // The ZIP64 EOCD Locator sits immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .context("Truncated ZIP64 locator")?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;
        Ok(Zip64EOCD::from_bytes(&eocd64_buf)?.directory)
    }

    /// List every entry of the archive.
    ///
    /// The whole central directory is fetched with one read.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let directory = self.central_directory().await?;
        let end = directory.offset.checked_add(directory.size);
        if end.is_none_or(|end| end > self.size) {
            bail!("Central Directory extends past the end of the file");
        }

        let mut cd_data = vec![0u8; directory.size as usize];
        self.reader
            .read_exact_at(directory.offset, &mut cd_data)
            .await?;

        let mut cursor = Cursor::new(&cd_data[..]);
        (0..directory.entries)
            .map(|_| ZipFileEntry::read_from(&mut cursor))
            .collect()
    }

    /// Offset of the first byte of an entry's (compressed) data.
    ///
    /// The local header's name and extra field may differ in length from the
    /// central directory copy, so the local header is read.
    pub async fn data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await?;
        let tail = local_header_tail(&lfh_buf)
            .with_context(|| format!("Entry {}", entry.file_name))?;
        entry
            .lfh_offset
            .checked_add(LFH_SIZE as u64 + tail)
            .with_context(|| format!("Entry {} has an out-of-range offset", entry.file_name))
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

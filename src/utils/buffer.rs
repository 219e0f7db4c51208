//! Paged memory maps
//!
//! A single memory map cannot cover more than [`MAX_PAGE_SIZE`] bytes, so
//! large index files are mapped as an ordered sequence of windows (pages)
//! starting at caller-provided boundaries. A global file offset is resolved
//! into a page and a local offset within that page.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;
use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::base::MAX_PAGE_SIZE;
use crate::error::{Error, IoContext, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

enum PageMap {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

/// One memory-mapped window `[start, start + len)` of a file
pub struct Page {
    start: u64,
    map: PageMap,
}

impl Page {
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data(&self) -> &[u8] {
        match &self.map {
            PageMap::ReadOnly(m) => &m[..],
            PageMap::ReadWrite(m) => &m[..],
        }
    }

    fn data_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.map {
            PageMap::ReadOnly(_) => Err(Error::ReadOnly),
            PageMap::ReadWrite(m) => Ok(&mut m[..]),
        }
    }
}

/// A file mapped as a sequence of pages
///
/// Pages are unmapped and the file released when the buffer is dropped.
pub struct PagedBuffer {
    path: PathBuf,
    // Kept open for the lifetime of the maps
    _file: File,
    pages: Vec<Page>,
    len: u64,
    mode: AccessMode,
}

impl PagedBuffer {
    /// Maps `path` with one page per boundary
    ///
    /// Boundaries must start at 0, be strictly increasing and lie within the
    /// file. An empty file takes no boundary at all.
    pub fn open(path: &Path, boundaries: &[u64], mode: AccessMode) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingPath(path.to_path_buf()));
        }
        let file = File::options()
            .read(true)
            .write(mode == AccessMode::ReadWrite)
            .open(path)
            .context(|| format!("opening {}", path.display()))?;
        let len = file
            .metadata()
            .context(|| format!("reading metadata of {}", path.display()))?
            .len();

        check_boundaries(boundaries, len)?;

        let mut pages = Vec::with_capacity(boundaries.len());
        for (ix, &start) in boundaries.iter().enumerate() {
            let end = boundaries.get(ix + 1).copied().unwrap_or(len);
            let size = (end - start) as usize;
            let mut options = MmapOptions::new();
            options.offset(start).len(size);

            let map = match mode {
                AccessMode::ReadOnly => PageMap::ReadOnly(
                    unsafe { options.map(&file) }
                        .context(|| format!("mapping {} at {}", path.display(), start))?,
                ),
                AccessMode::ReadWrite => PageMap::ReadWrite(
                    unsafe { options.map_mut(&file) }
                        .context(|| format!("mapping {} at {}", path.display(), start))?,
                ),
            };
            pages.push(Page { start, map });
        }

        debug!(
            "Mapped {} ({} bytes) into {} page(s)",
            path.display(),
            len,
            pages.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
            pages,
            len,
            mode,
        })
    }

    /// Maps a file of fixed-size records so that no record straddles a page
    pub fn open_fixed(
        path: &Path,
        record_size: usize,
        max_page_size: u64,
        mode: AccessMode,
    ) -> Result<Self> {
        let len = std::fs::metadata(path)
            .map_err(|_| Error::MissingPath(path.to_path_buf()))?
            .len();
        let boundaries = fixed_record_boundaries(len, record_size, max_page_size)?;
        Self::open(path, &boundaries, mode)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total length of the mapped file
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Returns the page holding `offset` and the offset within this page
    pub fn resolve(&self, offset: u64) -> Result<(usize, usize)> {
        if offset >= self.len {
            return Err(Error::OutOfRange {
                offset,
                len: self.len,
            });
        }

        let page_ix = self
            .pages
            .iter()
            .rposition(|page| page.start <= offset)
            .ok_or(Error::OutOfRange {
                offset,
                len: self.len,
            })?;
        Ok((page_ix, (offset - self.pages[page_ix].start) as usize))
    }

    /// Sequential reader starting at `offset`, crossing pages as needed
    pub fn reader(&self, offset: u64) -> Result<PagedReader<'_>> {
        let (page, position) = self.resolve(offset)?;
        Ok(PagedReader {
            buffer: self,
            page,
            position,
        })
    }

    /// A contiguous record of `len` bytes starting at `offset`
    pub fn slice(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let (page_ix, local) = self.resolve(offset)?;
        let data = self.pages[page_ix].data();
        if local + len > data.len() {
            return Err(self.overflow(offset, len));
        }
        Ok(&data[local..local + len])
    }

    /// Mutable access to a record (read-write buffers only)
    pub fn slice_mut(&mut self, offset: u64, len: usize) -> Result<&mut [u8]> {
        let (page_ix, local) = self.resolve(offset)?;
        let total = self.len;
        let data = self.pages[page_ix].data_mut()?;
        if local + len > data.len() {
            return Err(if offset + len as u64 > total {
                Error::OutOfRange { offset, len: total }
            } else {
                Error::SplitRecord { offset, len }
            });
        }
        Ok(&mut data[local..local + len])
    }

    fn overflow(&self, offset: u64, len: usize) -> Error {
        if offset + len as u64 > self.len {
            Error::OutOfRange {
                offset,
                len: self.len,
            }
        } else {
            Error::SplitRecord { offset, len }
        }
    }

    /// Writes back modified pages
    pub fn flush(&self) -> Result<()> {
        for page in self.pages.iter() {
            if let PageMap::ReadWrite(m) = &page.map {
                m.flush()
                    .context(|| format!("flushing {} at {}", self.path.display(), page.start))?;
            }
        }
        Ok(())
    }

    /// Flushes (if writable) and unmaps all pages
    pub fn close(self) -> Result<()> {
        self.flush()
    }
}

/// Reads a paged buffer sequentially
pub struct PagedReader<'a> {
    buffer: &'a PagedBuffer,
    page: usize,
    position: usize,
}

impl Read for PagedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while let Some(page) = self.buffer.pages.get(self.page) {
            let data = page.data();
            if self.position < data.len() {
                let mut rest = &data[self.position..];
                let read = rest.read(buf)?;
                self.position += read;
                return Ok(read);
            }
            self.page += 1;
            self.position = 0;
        }
        Ok(0)
    }
}

fn check_boundaries(boundaries: &[u64], len: u64) -> Result<()> {
    if let Some(&first) = boundaries.first() {
        if first != 0 {
            return Err(Error::invalid_arg(
                "boundaries",
                format!("first boundary should be 0, got {}", first),
            ));
        }
    } else if len > 0 {
        return Err(Error::invalid_arg(
            "boundaries",
            "no boundary given for a non-empty file",
        ));
    }

    for window in boundaries.windows(2) {
        if window[1] <= window[0] {
            return Err(Error::invalid_arg(
                "boundaries",
                format!("boundaries not increasing: {} then {}", window[0], window[1]),
            ));
        }
        if window[1] - window[0] > MAX_PAGE_SIZE {
            return Err(Error::invalid_arg(
                "boundaries",
                format!("page at {} exceeds the maximum page size", window[0]),
            ));
        }
    }

    if let Some(&last) = boundaries.last() {
        if last >= len {
            return Err(Error::invalid_arg(
                "boundaries",
                format!("boundary {} is beyond the end of the file ({})", last, len),
            ));
        }
        if len - last > MAX_PAGE_SIZE {
            return Err(Error::invalid_arg(
                "boundaries",
                format!("page at {} exceeds the maximum page size", last),
            ));
        }
    }
    Ok(())
}

/// Page boundaries for a file of fixed-size records
///
/// The page capacity is the largest multiple of `record_size` that fits in
/// `max_page_size`, so that a record never straddles two pages.
pub fn fixed_record_boundaries(
    file_len: u64,
    record_size: usize,
    max_page_size: u64,
) -> Result<Vec<u64>> {
    let record_size = record_size as u64;
    if record_size == 0 || record_size > max_page_size {
        return Err(Error::invalid_arg(
            "record_size",
            format!(
                "record size {} does not fit in a page of {} bytes",
                record_size, max_page_size
            ),
        ));
    }
    let capacity = (max_page_size / record_size) * record_size;

    let mut boundaries = Vec::new();
    let mut start = 0;
    while start < file_len {
        boundaries.push(start);
        start += capacity;
    }
    Ok(boundaries)
}

/// Page boundaries for a file of variable-size records laid out back to back
///
/// A new page starts whenever the next record would not fit in the current
/// one, so that a record is always readable as one contiguous slice.
pub fn variable_record_boundaries<I>(sizes: I, max_page_size: u64) -> Result<Vec<u64>>
where
    I: IntoIterator<Item = u64>,
{
    let mut boundaries = Vec::new();
    let mut offset = 0u64;
    let mut page_size = 0u64;

    for size in sizes {
        if size > max_page_size {
            return Err(Error::invalid_arg(
                "sizes",
                format!(
                    "record at {} ({} bytes) is larger than a page",
                    offset, size
                ),
            ));
        }
        if boundaries.is_empty() {
            boundaries.push(0);
        } else if size > max_page_size - page_size {
            boundaries.push(offset);
            page_size = 0;
        }
        page_size += size;
        offset += size;
    }

    if offset == 0 {
        boundaries.clear();
    }
    Ok(boundaries)
}

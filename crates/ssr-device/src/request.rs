use ssr_storage::{DiskError, Page, Result, PAGE_SIZE, SECTOR_SIZE};

/// Direction of a block request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// One contiguous piece of a request: a page, an in-page offset and a byte
/// length. `len` is a positive multiple of the sector size and the access
/// fits inside the page; both are enforced at construction.
#[derive(Debug)]
pub struct Segment {
    page: Page,
    offset: usize,
    len: usize,
}

impl Segment {
    pub fn new(page: Page, offset: usize, len: usize) -> Result<Self> {
        if len == 0 || len % SECTOR_SIZE != 0 || offset % SECTOR_SIZE != 0 {
            return Err(DiskError::Misaligned { offset, len });
        }
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(Self { page, offset, len }),
            _ => Err(DiskError::Misaligned { offset, len }),
        }
    }

    /// Build a full segment from a caller buffer (at in-page offset 0).
    pub fn from_payload(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() || buf.len() % SECTOR_SIZE != 0 || buf.len() > PAGE_SIZE {
            return Err(DiskError::Misaligned {
                offset: 0,
                len: buf.len(),
            });
        }
        let mut page = Page::new();
        page.as_bytes_mut()[..buf.len()].copy_from_slice(buf);
        Ok(Self {
            page,
            offset: 0,
            len: buf.len(),
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn sectors(&self) -> u64 {
        (self.len / SECTOR_SIZE) as u64
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    /// The bytes the segment addresses.
    pub fn payload(&self) -> &[u8] {
        &self.page.as_bytes()[self.offset..self.offset + self.len]
    }
}

/// A submitted block operation: a direction, a starting logical sector and
/// one or more segments contiguous in logical-sector space.
#[derive(Debug)]
pub struct BioRequest {
    direction: Direction,
    sector: u64,
    segments: Vec<Segment>,
}

impl BioRequest {
    pub fn new(direction: Direction, sector: u64) -> Self {
        Self {
            direction,
            sector,
            segments: Vec::new(),
        }
    }

    pub fn read(sector: u64) -> Self {
        Self::new(Direction::Read, sector)
    }

    pub fn write(sector: u64) -> Self {
        Self::new(Direction::Write, sector)
    }

    pub fn push_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.push_segment(segment);
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn sector(&self) -> u64 {
        self.sector
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    /// Total logical sectors the request covers.
    pub fn total_sectors(&self) -> u64 {
        self.segments.iter().map(Segment::sectors).sum()
    }

    /// All segment payloads flattened into one buffer, in logical-sector
    /// order.
    pub fn payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_sectors() as usize * SECTOR_SIZE);
        for seg in &self.segments {
            out.extend_from_slice(seg.payload());
        }
        out
    }
}

/// Invoked exactly once per submitted request, from the worker, with the
/// request handed back and the outcome.
pub type Completion = Box<dyn FnOnce(BioRequest, Result<()>) + Send + 'static>;

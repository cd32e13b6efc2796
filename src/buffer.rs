//! Growable byte arena passed between pipeline stages.
//!
//! A [`StagingBuffer`] holds one committed window of bytes inside a larger
//! storage region. Stages rewrite the window in place through
//! [`acquire`](StagingBuffer::acquire) / [`commit`](StagingBuffer::commit),
//! and framing stages insert headers through the free space in front of the
//! window ([`prepend`](StagingBuffer::prepend)), so the steady state never
//! reallocates.
//!
//! ```text
//! storage: [ front slack | committed window | back slack ]
//!          0             offset        offset+size     capacity
//! ```

use crate::error::PlaybackError;

/// Largest storage a staging buffer may grow to (64 MiB).
pub const MAX_STAGING_BYTES: usize = 64 * 1024 * 1024;

/// A contiguous byte window with front and back headroom.
///
/// # Example
///
/// ```
/// use stream_playback::StagingBuffer;
///
/// let mut buffer = StagingBuffer::with_headroom(8, 64).unwrap();
/// buffer.extend_from_slice(&[1, 2, 3, 4]).unwrap();
/// buffer.prepend(&[0xAA, 0xBB]).unwrap();
/// assert_eq!(buffer.data(), &[0xAA, 0xBB, 1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StagingBuffer {
    storage: Vec<u8>,
    offset: usize,
    size: usize,
    acquired: Option<(usize, usize)>,
}

impl StagingBuffer {
    /// Allocates `capacity` bytes of storage with an empty window.
    pub fn with_capacity(capacity: usize) -> Result<Self, PlaybackError> {
        Self::with_headroom(0, capacity)
    }

    /// Allocates storage with `headroom` bytes reserved in front of the window.
    ///
    /// Stages that prepend headers should be fed buffers whose headroom
    /// covers the largest header they insert.
    pub fn with_headroom(headroom: usize, capacity: usize) -> Result<Self, PlaybackError> {
        let total = headroom
            .checked_add(capacity)
            .ok_or(PlaybackError::AllocationFailed {
                requested: usize::MAX,
            })?;
        let mut buffer = Self::default();
        buffer.resize_storage(total)?;
        buffer.offset = headroom;
        Ok(buffer)
    }

    /// Copies `data` into new storage of at least `reserved` bytes.
    pub fn from_slice(data: &[u8], reserved: usize) -> Result<Self, PlaybackError> {
        let mut buffer = Self::default();
        buffer.resize_storage(data.len().max(reserved))?;
        buffer.storage[..data.len()].copy_from_slice(data);
        buffer.size = data.len();
        Ok(buffer)
    }

    /// The committed bytes.
    pub fn data(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.size]
    }

    /// The committed bytes, writable in place.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.offset..self.offset + self.size]
    }

    /// Number of committed bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` if no bytes are committed.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Total storage in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Free bytes in front of the committed window.
    pub fn headroom(&self) -> usize {
        self.offset
    }

    /// Reserves a writable region of `n` bytes that does not overlap the
    /// committed window.
    ///
    /// The region is taken from the front slack when it is large enough,
    /// then from the back slack, and otherwise storage grows so the back
    /// slack holds exactly `n` bytes. The committed bytes are returned
    /// alongside the region so a stage can transform one into the other.
    /// [`commit`](Self::commit) then makes the region the new window.
    pub fn acquire(&mut self, n: usize) -> Result<(&[u8], &mut [u8]), PlaybackError> {
        let start = if self.offset >= n {
            0
        } else {
            let back = self.storage.len() - self.offset - self.size;
            if back < n {
                self.resize_storage(self.storage.len() - back + n)?;
            }
            self.offset + self.size
        };
        self.acquired = Some((start, n));

        let (offset, size) = (self.offset, self.size);
        if start + n <= offset {
            let (head, tail) = self.storage.split_at_mut(offset);
            Ok((&tail[..size], &mut head[start..start + n]))
        } else {
            let (head, tail) = self.storage.split_at_mut(start);
            Ok((&head[offset..offset + size], &mut tail[..n]))
        }
    }

    /// Makes the first `n` bytes of the last acquired region the committed
    /// window, replacing the previous one.
    pub fn commit(&mut self, n: usize) -> Result<(), PlaybackError> {
        let (start, len) = self
            .acquired
            .take()
            .ok_or_else(|| PlaybackError::invalid_argument("commit without a pending acquire"))?;
        if n > len {
            return Err(PlaybackError::invalid_argument(format!(
                "commit of {n} bytes exceeds acquired region of {len}"
            )));
        }
        self.offset = start;
        self.size = n;
        Ok(())
    }

    /// Inserts `header` in front of the committed bytes.
    ///
    /// Uses the front slack when it is large enough. Otherwise storage grows
    /// and the committed bytes move back to make room.
    pub fn prepend(&mut self, header: &[u8]) -> Result<(), PlaybackError> {
        let n = header.len();
        if self.offset < n {
            let needed = n + self.size;
            if self.storage.len() < needed {
                self.resize_storage(needed)?;
            }
            self.storage
                .copy_within(self.offset..self.offset + self.size, n);
            self.offset = n;
        }
        self.offset -= n;
        self.size += n;
        self.storage[self.offset..self.offset + n].copy_from_slice(header);
        self.acquired = None;
        Ok(())
    }

    /// Appends `bytes` after the committed window.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), PlaybackError> {
        let end = self.offset + self.size;
        self.ensure_back(bytes.len())?;
        self.storage[end..end + bytes.len()].copy_from_slice(bytes);
        self.size += bytes.len();
        Ok(())
    }

    /// Zero-pads the committed window up to `target` bytes.
    ///
    /// Does nothing if the window is already at least that large.
    pub fn grow(&mut self, target: usize) -> Result<(), PlaybackError> {
        if target <= self.size {
            return Ok(());
        }
        let extra = target - self.size;
        let end = self.offset + self.size;
        self.ensure_back(extra)?;
        self.storage[end..end + extra].fill(0);
        self.size = target;
        Ok(())
    }

    /// Views the committed bytes as consecutive `n`-byte pieces.
    ///
    /// The last piece is shorter when the size is not a multiple of `n`.
    /// A zero `n` yields no pieces.
    pub fn split<'a, T>(&'a self, n: usize) -> Vec<T>
    where
        T: From<&'a [u8]>,
    {
        if n == 0 {
            return Vec::new();
        }
        self.data().chunks(n).map(T::from).collect()
    }

    /// Empties the window, keeping storage and front headroom.
    pub fn clear(&mut self) {
        self.size = 0;
        self.acquired = None;
    }

    fn ensure_back(&mut self, n: usize) -> Result<(), PlaybackError> {
        let back = self.storage.len() - self.offset - self.size;
        if back < n {
            self.resize_storage(self.storage.len() - back + n)?;
        }
        Ok(())
    }

    fn resize_storage(&mut self, total: usize) -> Result<(), PlaybackError> {
        if total > MAX_STAGING_BYTES {
            return Err(PlaybackError::AllocationFailed { requested: total });
        }
        if total > self.storage.len() {
            self.storage
                .try_reserve_exact(total - self.storage.len())
                .map_err(|_| PlaybackError::AllocationFailed { requested: total })?;
            self.storage.resize(total, 0);
        }
        Ok(())
    }
}

impl From<&[u8]> for StagingBuffer {
    fn from(data: &[u8]) -> Self {
        Self {
            storage: data.to_vec(),
            offset: 0,
            size: data.len(),
            acquired: None,
        }
    }
}

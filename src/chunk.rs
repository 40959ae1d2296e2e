use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::{debug, trace};

use crate::{
    serializer::{Bincode, Serializer},
    Error, Result,
};

pub(crate) const DEFAULT_SUB_BATCH_SIZE: usize = 128;
pub(crate) const DEFAULT_IO_BUFFER_BYTES: usize = 64 * 1024;

/// Splits a source into consecutive chunks of at most `size` records.
///
/// The last chunk may be shorter. No chunk is ever empty.
pub struct Chunks<I> {
    source: I,
    size: usize,
}

impl<I> Chunks<I>
where
    I: Iterator,
{
    pub fn new(source: impl IntoIterator<IntoIter = I>, size: usize) -> Result<Self> {
        if size < 1 {
            return Err(Error::InvalidArgument(format!(
                "chunk size must be a positive integer, got {size}"
            )));
        }
        Ok(Self {
            source: source.into_iter(),
            size,
        })
    }
}

impl<I> Iterator for Chunks<I>
where
    I: Iterator,
{
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<_> = self.source.by_ref().take(self.size).collect();
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

/// Writes records to scratch storage and hands back a [`ChunkReader`] over them.
///
/// Records are encoded in sub-batches of `sub_batch_size`, followed by one empty
/// sub-batch marking the end of the chunk.
#[derive(Debug, Clone)]
pub struct Spiller<S> {
    serializer: S,
    sub_batch_size: usize,
    io_buffer_bytes: usize,
    temp_dir: Option<PathBuf>,
}

impl Default for Spiller<Bincode> {
    fn default() -> Self {
        Self::new(Bincode)
    }
}

impl<S> Spiller<S> {
    pub fn new(serializer: S) -> Self {
        Self {
            serializer,
            sub_batch_size: DEFAULT_SUB_BATCH_SIZE,
            io_buffer_bytes: DEFAULT_IO_BUFFER_BYTES,
            temp_dir: None,
        }
    }

    pub fn sub_batch_size(mut self, size: usize) -> Self {
        self.sub_batch_size = size;
        self
    }

    pub fn io_buffer_bytes(mut self, bytes: usize) -> Self {
        self.io_buffer_bytes = bytes;
        self
    }

    /// Directory for anonymous scratch files. Defaults to the system temp dir.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn scratch_file(&self) -> Result<File> {
        let file = match &self.temp_dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        Ok(file)
    }

    /// Spills to a new anonymous temporary file. The file is gone once the returned
    /// reader releases it.
    pub fn spill<T>(&self, chunk: impl IntoIterator<Item = T>) -> Result<ChunkReader<T, S, File>>
    where
        S: Serializer<T> + Clone,
    {
        let file = self.scratch_file()?;
        self.spill_into(chunk, file)
    }

    /// Spills into a caller-supplied resource, which is rewound to offset 0 for reading.
    pub fn spill_into<T, R>(
        &self,
        chunk: impl IntoIterator<Item = T>,
        resource: R,
    ) -> Result<ChunkReader<T, S, R>>
    where
        S: Serializer<T> + Clone,
        R: Read + Write + Seek,
    {
        if self.io_buffer_bytes < 1 {
            return Err(Error::InvalidArgument(format!(
                "I/O buffer size must be a positive integer, got {}",
                self.io_buffer_bytes
            )));
        }
        let sub_batches = Chunks::new(chunk, self.sub_batch_size)?;
        let mut writer = BufWriter::with_capacity(self.io_buffer_bytes, resource);
        let mut count = 0;
        for sub_batch in sub_batches {
            self.serializer.encode(&sub_batch, &mut writer)?;
            count += sub_batch.len();
        }
        self.serializer.encode(&[], &mut writer)?;

        let mut resource = writer.into_inner().map_err(|e| e.into_error())?;
        resource.seek(SeekFrom::Start(0))?;
        debug!(
            "Spilled {} records with {} ({:?})",
            count,
            <S as Serializer<T>>::NAME,
            <S as Serializer<T>>::MODE
        );

        Ok(ChunkReader::new(
            resource,
            self.serializer.clone(),
            self.io_buffer_bytes,
        ))
    }
}

/// Lazily replays records spilled by a [`Spiller`].
///
/// The underlying resource is released exactly once: when the end marker is read, on the
/// first error, on [`close`](ChunkReader::close), or when the reader is dropped. The reader
/// yields nothing after that.
pub struct ChunkReader<T, S, R> {
    reader: Option<BufReader<R>>,
    serializer: S,
    sub_batch: std::vec::IntoIter<T>,
}

impl<T, S, R> ChunkReader<T, S, R>
where
    R: Read,
{
    fn new(resource: R, serializer: S, capacity: usize) -> Self {
        Self {
            reader: Some(BufReader::with_capacity(capacity, resource)),
            serializer,
            sub_batch: Vec::new().into_iter(),
        }
    }
}

impl<T, S, R> ChunkReader<T, S, R> {
    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    /// Releases the scratch resource now and discards any records not read yet.
    pub fn close(&mut self) {
        self.sub_batch = Vec::new().into_iter();
        if let Some(reader) = self.reader.take() {
            drop(reader);
            trace!("Released scratch resource");
        }
    }
}

impl<T, S, R> Iterator for ChunkReader<T, S, R>
where
    S: Serializer<T>,
    R: Read,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.sub_batch.next() {
                return Some(Ok(record));
            }

            let reader = self.reader.as_mut()?;
            match self.serializer.decode(reader) {
                Ok(sub_batch) if sub_batch.is_empty() => {
                    self.close();
                    return None;
                }
                Ok(sub_batch) => self.sub_batch = sub_batch.into_iter(),
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<T, S, R> Drop for ChunkReader<T, S, R> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Caches `source` in an anonymous temporary file and replays it lazily.
pub fn spill_to_storage<T, S>(
    source: impl IntoIterator<Item = T>,
    serializer: S,
) -> Result<ChunkReader<T, S, File>>
where
    S: Serializer<T> + Clone,
{
    Spiller::new(serializer).spill(source)
}

/// Like [`spill_to_storage`], but writes into `resource` instead of a temporary file.
pub fn spill_to_storage_in<T, S, R>(
    source: impl IntoIterator<Item = T>,
    resource: R,
    serializer: S,
) -> Result<ChunkReader<T, S, R>>
where
    S: Serializer<T> + Clone,
    R: Read + Write + Seek,
{
    Spiller::new(serializer).spill_into(source, resource)
}

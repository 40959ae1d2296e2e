use std::fs::File;
use std::path::PathBuf;

use log::debug;

use crate::{
    chunk::{ChunkReader, Chunks, Spiller, DEFAULT_IO_BUFFER_BYTES, DEFAULT_SUB_BATCH_SIZE},
    merge::Merge,
    order::KeyOrder,
    serializer::{Bincode, Serializer},
    Error, Result,
};

#[derive(Debug, Clone)]
pub struct SortConfig<S = Bincode> {
    chunk_size: usize,
    reverse: bool,
    serializer: S,
    sub_batch_size: usize,
    io_buffer_bytes: usize,
    temp_dir: Option<PathBuf>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SortConfig {
    pub fn new() -> Self {
        SortConfig {
            chunk_size: usize::MAX,
            reverse: false,
            serializer: Bincode,
            sub_batch_size: DEFAULT_SUB_BATCH_SIZE,
            io_buffer_bytes: DEFAULT_IO_BUFFER_BYTES,
            temp_dir: None,
        }
    }
}

impl<S> SortConfig<S> {
    /// Largest number of records held in memory at once. Unbounded by default.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Codec used for spilled chunks.
    pub fn serializer<S2>(self, serializer: S2) -> SortConfig<S2> {
        SortConfig {
            chunk_size: self.chunk_size,
            reverse: self.reverse,
            serializer,
            sub_batch_size: self.sub_batch_size,
            io_buffer_bytes: self.io_buffer_bytes,
            temp_dir: self.temp_dir,
        }
    }

    /// Records per serialization unit in a spilled chunk.
    pub fn sub_batch_size(mut self, sub_batch_size: usize) -> Self {
        self.sub_batch_size = sub_batch_size;
        self
    }

    pub fn io_buffer_bytes(mut self, io_buffer_bytes: usize) -> Self {
        self.io_buffer_bytes = io_buffer_bytes;
        self
    }

    pub fn temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size < 1 {
            return Err(Error::InvalidArgument(format!(
                "chunk size must be a positive integer, got {}",
                self.chunk_size
            )));
        }
        if self.sub_batch_size < 1 {
            return Err(Error::InvalidArgument(format!(
                "sub-batch size must be a positive integer, got {}",
                self.sub_batch_size
            )));
        }
        if self.io_buffer_bytes < 1 {
            return Err(Error::InvalidArgument(format!(
                "I/O buffer size must be a positive integer, got {}",
                self.io_buffer_bytes
            )));
        }
        Ok(())
    }

    fn spiller(&self) -> Spiller<S>
    where
        S: Clone,
    {
        let spiller = Spiller::new(self.serializer.clone())
            .sub_batch_size(self.sub_batch_size)
            .io_buffer_bytes(self.io_buffer_bytes);
        match &self.temp_dir {
            Some(dir) => spiller.temp_dir(dir),
            None => spiller,
        }
    }
}

/// Output of [`sort`] and [`sort_by_key`].
pub enum Sorted<T, K, F, S> {
    /// The input fit in a single chunk and never touched the disk.
    InMemory(std::vec::IntoIter<T>),
    Merged(Merge<T, K, ChunkReader<T, S, File>, F>),
}

impl<T, K, F, S> Sorted<T, K, F, S> {
    pub fn is_in_memory(&self) -> bool {
        matches!(self, Sorted::InMemory(_))
    }
}

impl<T, K, F, S> Iterator for Sorted<T, K, F, S>
where
    K: Ord,
    F: Fn(&T) -> K,
    S: Serializer<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Sorted::InMemory(records) => records.next().map(Ok),
            Sorted::Merged(merged) => merged.next(),
        }
    }
}

/// Sorts `source` by `key`, holding at most `chunk_size` records in memory.
///
/// Every chunk is sorted in memory. As long as no chunk reaches `chunk_size` records the
/// input is known to fit in one chunk, which is then returned as is. Once a full chunk is
/// seen, that chunk and all following ones are spilled to anonymous temporary files and
/// merged back lazily. An input of exactly `chunk_size` records therefore spills one chunk.
///
/// Fails with [`Error::InvalidArgument`] before reading any input if the chunk size,
/// sub-batch size or I/O buffer size is zero.
pub fn sort_by_key<T, K, F, S>(
    source: impl IntoIterator<Item = T>,
    key: F,
    config: SortConfig<S>,
) -> Result<Sorted<T, K, F, S>>
where
    K: Ord,
    F: Fn(&T) -> K,
    S: Serializer<T> + Clone,
{
    config.validate()?;

    let order = KeyOrder::new(key, config.reverse);
    let spiller = config.spiller();
    let mut single = true;
    let mut spilled = Vec::new();
    let mut last = Vec::new();

    for mut chunk in Chunks::new(source, config.chunk_size)? {
        order.sort(&mut chunk);
        if chunk.len() == config.chunk_size {
            single = false;
        }
        if single {
            last = chunk;
        } else {
            debug!("Spilling chunk {} ({} records)", spilled.len(), chunk.len());
            spilled.push(spiller.spill(chunk)?);
        }
    }

    let (key, reverse) = order.into_parts();
    if single {
        debug!("Sorted {} records in memory", last.len());
        Ok(Sorted::InMemory(last.into_iter()))
    } else {
        debug!("Merging {} spilled chunks", spilled.len());
        Ok(Sorted::Merged(Merge::new(spilled, key, reverse)))
    }
}

/// Sorts `source` by the records' natural order.
pub fn sort<T, S>(
    source: impl IntoIterator<Item = T>,
    config: SortConfig<S>,
) -> Result<Sorted<T, T, fn(&T) -> T, S>>
where
    T: Ord + Clone,
    S: Serializer<T> + Clone,
{
    sort_by_key(source, T::clone as fn(&T) -> T, config)
}

//! Sort iterators that do not fit in memory.
//!
//! The input is cut into chunks of at most `chunk_size` records. Each chunk is sorted in
//! memory and, unless the whole input fit in a single chunk, spilled to an anonymous
//! temporary file. The spilled chunks are then read back lazily and merged with a k-way
//! merge.
//!
//! ```no_run
//! use disk_sorted::{sort, SortConfig};
//!
//! let input = vec![1, 10, 2, 9, 3, 8, 4, 7, 5, 6];
//! let config = SortConfig::new().chunk_size(4);
//! let sorted = sort(input, config)?.collect::<disk_sorted::Result<Vec<i32>>>()?;
//! assert_eq!(sorted, (1..=10).collect::<Vec<_>>());
//! # Ok::<(), disk_sorted::Error>(())
//! ```

mod chunk;
mod merge;
pub mod order;
pub mod serializer;
mod sorter;

use thiserror::Error;

pub use chunk::{spill_to_storage, spill_to_storage_in, ChunkReader, Chunks, Spiller};
pub use merge::{merge, merge_by_key, Merge};
pub use serializer::{Bincode, JsonLines, Pod, Serializer, StorageMode};
pub use sorter::{sort, sort_by_key, SortConfig, Sorted};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Failed to (de)serialize a batch with {codec}")]
    Serialization {
        codec: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("I/O error on scratch storage")]
    IO(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn serialization(
        codec: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            codec,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Codecs used to move batches of records between memory and scratch storage.
//!
//! A [`Serializer`] writes one batch per [`encode`](Serializer::encode) call and reads them
//! back, in write order, with [`decode`](Serializer::decode). None of them support random
//! access.

use std::io::{self, BufRead, Read, Write};

use serde::{de::DeserializeOwned, Serialize};

use crate::{Error, Result};

const BINCODE: &str = "bincode";
const JSON_LINES: &str = "json-lines";
const POD: &str = "pod";

/// What the scratch resource holds once a codec has written to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Binary,
    /// UTF-8, one batch per line.
    Text,
}

pub trait Serializer<T> {
    const NAME: &'static str;
    const MODE: StorageMode;

    fn encode<W: Write>(&self, batch: &[T], writer: &mut W) -> Result<()>;

    /// Reads the next batch. Fails if the stream ends before a batch could be read.
    fn decode<R: BufRead>(&self, reader: &mut R) -> Result<Vec<T>>;
}

fn truncated(codec: &'static str) -> Error {
    Error::serialization(
        codec,
        io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended before the end marker"),
    )
}

/// General purpose binary codec for anything serde can handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

impl<T> Serializer<T> for Bincode
where
    T: Serialize + DeserializeOwned,
{
    const NAME: &'static str = BINCODE;
    const MODE: StorageMode = StorageMode::Binary;

    fn encode<W: Write>(&self, batch: &[T], writer: &mut W) -> Result<()> {
        bincode::serde::encode_into_std_write(batch, writer, bincode::config::standard())
            .map_err(|e| Error::serialization(BINCODE, e))?;
        Ok(())
    }

    fn decode<R: BufRead>(&self, reader: &mut R) -> Result<Vec<T>> {
        bincode::serde::decode_from_std_read(reader, bincode::config::standard())
            .map_err(|e| Error::serialization(BINCODE, e))
    }
}

/// Line-delimited JSON: each batch is a JSON array on its own line.
///
/// Only values with a JSON representation survive the trip. Non-finite floats are written
/// as `null` and then fail to decode, and maps keyed by anything but strings fail to
/// encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLines;

impl<T> Serializer<T> for JsonLines
where
    T: Serialize + DeserializeOwned,
{
    const NAME: &'static str = JSON_LINES;
    const MODE: StorageMode = StorageMode::Text;

    fn encode<W: Write>(&self, batch: &[T], writer: &mut W) -> Result<()> {
        serde_json::to_writer(&mut *writer, batch).map_err(|e| Error::serialization(JSON_LINES, e))?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn decode<R: BufRead>(&self, reader: &mut R) -> Result<Vec<T>> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(truncated(JSON_LINES));
        }
        serde_json::from_str(&line).map_err(|e| Error::serialization(JSON_LINES, e))
    }
}

/// Fast codec dumping the raw memory of plain built-in types.
///
/// Limited to [`bytemuck::Pod`] records: integers, floats, and arrays or `#[repr(C)]`
/// structs of them. Strings, vectors and anything holding a pointer cannot be stored.
/// The layout is native-endian, so spilled data is only readable on the machine that
/// wrote it. Zero-sized records are rejected at encode time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pod;

impl<T> Serializer<T> for Pod
where
    T: bytemuck::Pod,
{
    const NAME: &'static str = POD;
    const MODE: StorageMode = StorageMode::Binary;

    fn encode<W: Write>(&self, batch: &[T], writer: &mut W) -> Result<()> {
        let bytes: &[u8] = bytemuck::try_cast_slice(batch)
            .map_err(|e| Error::serialization(POD, format!("{e:?}")))?;
        writer.write_all(&(batch.len() as u64).to_ne_bytes())?;
        writer.write_all(bytes)?;
        Ok(())
    }

    fn decode<R: BufRead>(&self, reader: &mut R) -> Result<Vec<T>> {
        let mut len = [0u8; 8];
        match reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(truncated(POD)),
            Err(e) => return Err(e.into()),
        }
        let len = usize::try_from(u64::from_ne_bytes(len))
            .map_err(|e| Error::serialization(POD, e))?;
        let byte_len = len
            .checked_mul(std::mem::size_of::<T>())
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| Error::serialization(POD, format!("batch of {len} records is too large")))?;

        // grows with the data actually present, so a corrupt length cannot force a huge allocation
        let mut raw = Vec::new();
        reader.by_ref().take(byte_len).read_to_end(&mut raw)?;
        if raw.len() as u64 != byte_len {
            return Err(truncated(POD));
        }

        let mut batch = vec![T::zeroed(); len];
        let bytes: &mut [u8] = bytemuck::try_cast_slice_mut(&mut batch)
            .map_err(|e| Error::serialization(POD, format!("{e:?}")))?;
        bytes.copy_from_slice(&raw);
        Ok(batch)
    }
}

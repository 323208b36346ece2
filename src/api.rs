//! Result-code surface for hosts that cannot carry [Error] values.
//!
//! Every function reports success, a generic error, or an invalid argument
//! through [ResultCode]. Arguments that a host may leave unset are `Option`s;
//! a missing required argument yields [ResultCode::InvalidArgument]. Out
//! parameters are only written on [ResultCode::Ok].

use std::path::Path;

use tracing::debug;

use crate::{
    chunk::{ChunkId, Compression, IDENTIFIER_SIZE},
    error::{Error, ErrorKind, Result},
    reader::{ChunkFile, ChunkFileIterator},
    stream::{
        checked_offset, FileMode, FileStream, MemoryStream, ReadOnlyMemoryStream, Stream,
        StreamAccess, UserStream, UserStreamCallbacks,
    },
    writer::{ChunkFileWriter, WriterMode, WriterOptions},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,
    Error = 1,
    InvalidArgument = 2,
}

impl ResultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultCode::Ok => "RDF: No error",
            ResultCode::Error => "RDF: Error",
            ResultCode::InvalidArgument => "RDF: Invalid argument",
        }
    }

    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }
}

impl From<&Error> for ResultCode {
    fn from(err: &Error) -> Self {
        match err.kind() {
            ErrorKind::Argument => ResultCode::InvalidArgument,
            ErrorKind::Format | ErrorKind::Io | ErrorKind::Protocol => ResultCode::Error,
        }
    }
}

/// Maps a raw code back to its description; `None` for unknown values.
pub fn result_to_string(code: i32) -> Option<&'static str> {
    match code {
        0 => Some(ResultCode::Ok.as_str()),
        1 => Some(ResultCode::Error.as_str()),
        2 => Some(ResultCode::InvalidArgument.as_str()),
        _ => None,
    }
}

pub type StreamHandle = Box<dyn Stream>;
pub type ChunkFileHandle<'a> = ChunkFile<Box<dyn Stream + 'a>>;
pub type ChunkFileWriterHandle<'a> = ChunkFileWriter<Box<dyn Stream + 'a>>;

/// Parameters of one chunk, as passed to [chunk_file_writer_begin_chunk].
#[derive(Debug, Clone, Copy)]
pub struct ChunkCreateInfo<'h> {
    pub identifier: [u8; IDENTIFIER_SIZE],
    pub header_size: i64,
    pub header: Option<&'h [u8]>,
    pub compression: Compression,
    pub version: u32,
}

impl<'h> ChunkCreateInfo<'h> {
    pub fn new(identifier: &str, header: &'h [u8], compression: Compression, version: u32) -> Self {
        Self {
            identifier: *ChunkId::from(identifier).as_raw(),
            header_size: header.len() as i64,
            header: Some(header),
            compression,
            version,
        }
    }
}

pub struct ChunkFileWriterCreateInfo<'a> {
    pub stream: Option<&'a mut StreamHandle>,
    pub append_to_file: bool,
}

fn finish<T>(result: Result<T>, out: impl FnOnce(T)) -> ResultCode {
    match result {
        Ok(value) => {
            out(value);
            ResultCode::Ok
        }
        Err(err) => {
            debug!(error = %err, "api call failed");
            ResultCode::from(&err)
        }
    }
}

/// Checks a host-supplied size against the buffer it describes.
fn sized<'b>(size: i64, buffer: Option<&'b [u8]>) -> Result<&'b [u8]> {
    let size = checked_offset(size)? as usize;
    match buffer {
        None if size == 0 => Ok(&[]),
        None => Err(Error::invalid_argument("buffer cannot be null")),
        Some(buffer) => buffer
            .get(..size)
            .ok_or_else(|| Error::invalid_argument("size exceeds buffer length")),
    }
}

fn sized_mut<'b>(size: i64, buffer: Option<&'b mut [u8]>) -> Result<&'b mut [u8]> {
    let size = checked_offset(size)? as usize;
    match buffer {
        None if size == 0 => Ok(&mut []),
        None => Err(Error::invalid_argument("buffer cannot be null")),
        Some(buffer) => buffer
            .get_mut(..size)
            .ok_or_else(|| Error::invalid_argument("size exceeds buffer length")),
    }
}

fn chunk_index(index: i32) -> Result<usize> {
    usize::try_from(index).map_err(|_| Error::invalid_argument("chunk index must not be negative"))
}

macro_rules! require {
    ($($arg:ident),+) => {
        $(
            let Some($arg) = $arg else {
                return ResultCode::InvalidArgument;
            };
        )+
    };
}

// Streams

pub fn stream_from_file(
    filename: Option<&Path>,
    access: StreamAccess,
    mode: FileMode,
    stream: &mut Option<StreamHandle>,
) -> ResultCode {
    require!(filename);
    finish(FileStream::open(filename, access, mode), |s| {
        *stream = Some(Box::new(s))
    })
}

pub fn stream_open_file(filename: Option<&Path>, stream: &mut Option<StreamHandle>) -> ResultCode {
    stream_from_file(filename, StreamAccess::Read, FileMode::Open, stream)
}

pub fn stream_create_file(
    filename: Option<&Path>,
    stream: &mut Option<StreamHandle>,
) -> ResultCode {
    stream_from_file(filename, StreamAccess::ReadWrite, FileMode::Create, stream)
}

pub fn stream_from_read_only_memory(
    size: i64,
    buffer: Option<&[u8]>,
    stream: &mut Option<StreamHandle>,
) -> ResultCode {
    finish(sized(size, buffer), |data| {
        *stream = Some(Box::new(ReadOnlyMemoryStream::new(data.to_vec())))
    })
}

pub fn stream_create_memory_stream(stream: &mut Option<StreamHandle>) -> ResultCode {
    *stream = Some(Box::new(MemoryStream::new()));
    ResultCode::Ok
}

pub fn stream_from_user_stream(
    callbacks: Option<UserStreamCallbacks>,
    stream: &mut Option<StreamHandle>,
) -> ResultCode {
    require!(callbacks);
    finish(UserStream::new(callbacks), |s| *stream = Some(Box::new(s)))
}

/// Closes and releases the stream; the handle is reset even if closing fails.
pub fn stream_close(stream: &mut Option<StreamHandle>) -> ResultCode {
    let Some(mut handle) = stream.take() else {
        return ResultCode::InvalidArgument;
    };
    finish(handle.close(), drop)
}

pub fn stream_read(
    stream: Option<&mut StreamHandle>,
    count: i64,
    buffer: Option<&mut [u8]>,
    bytes_read: Option<&mut i64>,
) -> ResultCode {
    require!(stream);
    let result = sized_mut(count, buffer).and_then(|buf| stream.read(buf));
    finish(result, |n| {
        if let Some(out) = bytes_read {
            *out = n as i64;
        }
    })
}

pub fn stream_write(
    stream: Option<&mut StreamHandle>,
    count: i64,
    buffer: Option<&[u8]>,
    bytes_written: Option<&mut i64>,
) -> ResultCode {
    require!(stream);
    let result = sized(count, buffer).and_then(|buf| stream.write(buf));
    finish(result, |n| {
        if let Some(out) = bytes_written {
            *out = n as i64;
        }
    })
}

pub fn stream_tell(stream: Option<&mut StreamHandle>, position: Option<&mut i64>) -> ResultCode {
    require!(stream, position);
    finish(stream.tell(), |p| *position = p as i64)
}

pub fn stream_seek(stream: Option<&mut StreamHandle>, offset: i64) -> ResultCode {
    require!(stream);
    finish(checked_offset(offset).and_then(|o| stream.seek(o)), drop)
}

pub fn stream_get_size(stream: Option<&mut StreamHandle>, size: Option<&mut i64>) -> ResultCode {
    require!(stream, size);
    finish(stream.size(), |s| *size = s as i64)
}

// Reading

pub fn chunk_file_open_file(
    filename: Option<&Path>,
    file: &mut Option<ChunkFileHandle<'static>>,
) -> ResultCode {
    require!(filename);
    let result = FileStream::open_read(filename)
        .and_then(|s| ChunkFile::open(Box::new(s) as Box<dyn Stream>));
    finish(result, |f| *file = Some(f))
}

/// Opens a chunk file over a caller-owned stream, which must outlive it.
pub fn chunk_file_open_stream<'a>(
    stream: Option<&'a mut StreamHandle>,
    file: &mut Option<ChunkFileHandle<'a>>,
) -> ResultCode {
    require!(stream);
    finish(ChunkFile::open(Box::new(stream) as Box<dyn Stream + 'a>), |f| {
        *file = Some(f)
    })
}

pub fn chunk_file_close(file: &mut Option<ChunkFileHandle<'_>>) -> ResultCode {
    match file.take() {
        Some(_) => ResultCode::Ok,
        None => ResultCode::InvalidArgument,
    }
}

pub fn chunk_file_get_chunk_version(
    file: Option<&ChunkFileHandle<'_>>,
    id: Option<&str>,
    index: i32,
    version: Option<&mut u32>,
) -> ResultCode {
    require!(file, id, version);
    let result = chunk_index(index).and_then(|i| file.chunk_version(id, i));
    finish(result, |v| *version = v)
}

pub fn chunk_file_read_chunk_header(
    file: Option<&mut ChunkFileHandle<'_>>,
    id: Option<&str>,
    index: i32,
    buffer: Option<&mut [u8]>,
) -> ResultCode {
    require!(file, id, buffer);
    let result = chunk_index(index).and_then(|i| file.read_chunk_header(id, i, buffer));
    finish(result, drop)
}

pub fn chunk_file_read_chunk_data(
    file: Option<&mut ChunkFileHandle<'_>>,
    id: Option<&str>,
    index: i32,
    buffer: Option<&mut [u8]>,
) -> ResultCode {
    require!(file, id, buffer);
    let result = chunk_index(index).and_then(|i| file.read_chunk_data(id, i, buffer));
    finish(result, drop)
}

pub fn chunk_file_get_chunk_header_size(
    file: Option<&ChunkFileHandle<'_>>,
    id: Option<&str>,
    index: i32,
    size: Option<&mut i64>,
) -> ResultCode {
    require!(file, id, size);
    let result = chunk_index(index).and_then(|i| file.chunk_header_size(id, i));
    finish(result, |s| *size = s as i64)
}

pub fn chunk_file_get_chunk_data_size(
    file: Option<&ChunkFileHandle<'_>>,
    id: Option<&str>,
    index: i32,
    size: Option<&mut i64>,
) -> ResultCode {
    require!(file, id, size);
    let result = chunk_index(index).and_then(|i| file.chunk_data_size(id, i));
    finish(result, |s| *size = s as i64)
}

pub fn chunk_file_get_chunk_count(
    file: Option<&ChunkFileHandle<'_>>,
    id: Option<&str>,
    count: Option<&mut i64>,
) -> ResultCode {
    require!(file, id, count);
    *count = file.chunk_count(id) as i64;
    ResultCode::Ok
}

pub fn chunk_file_contains_chunk(
    file: Option<&ChunkFileHandle<'_>>,
    id: Option<&str>,
    index: i32,
    contains: Option<&mut bool>,
) -> ResultCode {
    require!(file, id, contains);
    finish(chunk_index(index), |i| *contains = file.contains_chunk(id, i))
}

pub fn chunk_file_create_chunk_iterator<'f>(
    file: Option<&'f ChunkFileHandle<'_>>,
    iterator: &mut Option<ChunkFileIterator<'f>>,
) -> ResultCode {
    require!(file);
    *iterator = Some(file.iter());
    ResultCode::Ok
}

pub fn chunk_file_destroy_chunk_iterator(
    iterator: &mut Option<ChunkFileIterator<'_>>,
) -> ResultCode {
    match iterator.take() {
        Some(_) => ResultCode::Ok,
        None => ResultCode::InvalidArgument,
    }
}

pub fn chunk_file_iterator_advance(iterator: Option<&mut ChunkFileIterator<'_>>) -> ResultCode {
    require!(iterator);
    iterator.advance();
    ResultCode::Ok
}

pub fn chunk_file_iterator_is_at_end(
    iterator: Option<&ChunkFileIterator<'_>>,
    at_end: Option<&mut bool>,
) -> ResultCode {
    require!(iterator, at_end);
    *at_end = iterator.is_at_end();
    ResultCode::Ok
}

pub fn chunk_file_iterator_get_chunk_identifier(
    iterator: Option<&ChunkFileIterator<'_>>,
    identifier: Option<&mut [u8; IDENTIFIER_SIZE]>,
) -> ResultCode {
    require!(iterator, identifier);
    let result = iterator
        .chunk_identifier()
        .ok_or_else(|| Error::protocol("iterator is at the end"));
    finish(result, |id| *identifier = *id.as_raw())
}

pub fn chunk_file_iterator_get_chunk_index(
    iterator: Option<&ChunkFileIterator<'_>>,
    index: Option<&mut i32>,
) -> ResultCode {
    require!(iterator, index);
    let result = iterator
        .chunk_index()
        .ok_or_else(|| Error::protocol("iterator is at the end"));
    finish(result, |i| *index = i as i32)
}

// Writing

pub fn chunk_file_writer_create<'a>(
    stream: Option<&'a mut StreamHandle>,
    writer: &mut Option<ChunkFileWriterHandle<'a>>,
) -> ResultCode {
    chunk_file_writer_create2(
        ChunkFileWriterCreateInfo {
            stream,
            append_to_file: false,
        },
        writer,
    )
}

pub fn chunk_file_writer_create2<'a>(
    info: ChunkFileWriterCreateInfo<'a>,
    writer: &mut Option<ChunkFileWriterHandle<'a>>,
) -> ResultCode {
    let Some(stream) = info.stream else {
        return ResultCode::InvalidArgument;
    };
    let mode = if info.append_to_file {
        WriterMode::Append
    } else {
        WriterMode::Create
    };

    let result = ChunkFileWriter::with_options(
        Box::new(stream) as Box<dyn Stream + 'a>,
        WriterOptions::default().mode(mode),
    );
    finish(result, |w| *writer = Some(w))
}

/// Finalizes and releases the writer. The handle is reset even if
/// finalizing fails, in which case the file must be treated as broken.
pub fn chunk_file_writer_destroy(writer: &mut Option<ChunkFileWriterHandle<'_>>) -> ResultCode {
    let Some(handle) = writer.take() else {
        return ResultCode::InvalidArgument;
    };
    finish(handle.finalize(), drop)
}

pub fn chunk_file_writer_begin_chunk(
    writer: Option<&mut ChunkFileWriterHandle<'_>>,
    info: Option<&ChunkCreateInfo<'_>>,
) -> ResultCode {
    require!(writer, info);
    let result = sized(info.header_size, info.header).and_then(|header| {
        writer.begin_chunk(
            ChunkId::from_raw(info.identifier),
            header,
            info.compression,
            info.version,
        )
    });
    finish(result, drop)
}

pub fn chunk_file_writer_append_to_chunk(
    writer: Option<&mut ChunkFileWriterHandle<'_>>,
    size: i64,
    data: Option<&[u8]>,
) -> ResultCode {
    require!(writer);
    finish(sized(size, data).and_then(|d| writer.append_to_chunk(d)), drop)
}

pub fn chunk_file_writer_end_chunk(
    writer: Option<&mut ChunkFileWriterHandle<'_>>,
    index: Option<&mut i32>,
) -> ResultCode {
    require!(writer);
    finish(writer.end_chunk(), |i| {
        if let Some(out) = index {
            *out = i as i32;
        }
    })
}

pub fn chunk_file_writer_write_chunk(
    writer: Option<&mut ChunkFileWriterHandle<'_>>,
    info: Option<&ChunkCreateInfo<'_>>,
    size: i64,
    data: Option<&[u8]>,
    index: Option<&mut i32>,
) -> ResultCode {
    require!(writer, info);
    let result = sized(info.header_size, info.header)
        .and_then(|header| Ok((header, sized(size, data)?)))
        .and_then(|(header, data)| {
            writer.write_chunk(
                ChunkId::from_raw(info.identifier),
                header,
                data,
                info.compression,
                info.version,
            )
        });
    finish(result, |i| {
        if let Some(out) = index {
            *out = i as i32;
        }
    })
}

//! Byte sources consumed by the detector and the streaming reader.

use std::io::{self, Read, Seek, SeekFrom};

/// A readable byte stream with an optional notion of position.
///
/// Every `Read + Seek` type (files, `Cursor`, `&mut File`) is a source.
/// Plain readers such as stdin or HTTP bodies go through [`Unseekable`].
pub trait ByteSource {
    /// Read up to `max_bytes`. An empty vector means end of stream.
    fn read_bytes(&mut self, max_bytes: usize) -> io::Result<Vec<u8>>;

    /// Current absolute position.
    fn tell(&mut self) -> io::Result<u64>;

    /// Move to an absolute position previously returned by [`tell`](Self::tell).
    fn seek_to(&mut self, position: u64) -> io::Result<()>;
}

impl<T: Read + Seek> ByteSource for T {
    fn read_bytes(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        read_once(self, max_bytes)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn seek_to(&mut self, position: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(position)).map(|_| ())
    }
}

/// Adapter for readers that cannot report or change their position.
/// `tell` and `seek_to` fail with [`io::ErrorKind::Unsupported`].
pub struct Unseekable<R> {
    inner: R,
}

impl<R: Read> Unseekable<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for Unseekable<R> {
    fn read_bytes(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        read_once(&mut self.inner, max_bytes)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Err(unsupported())
    }

    fn seek_to(&mut self, _position: u64) -> io::Result<()> {
        Err(unsupported())
    }
}

fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "source is not seekable")
}

/// One `read` call, retried on interruption.
fn read_once<R: Read + ?Sized>(reader: &mut R, max_bytes: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; max_bytes];
    let n = loop {
        match reader.read(&mut buf) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    };
    buf.truncate(n);
    Ok(buf)
}

// src/exec/capture.rs

//! Line reader over a capture channel.
//!
//! A stream is backed either by the live read end of a pipe/pty (background
//! invocations, read lazily) or by lines drained into memory before the
//! foreground wait. Callers see the same operations either way.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::os::fd::{AsFd, OwnedFd};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::trace;

use crate::errors::Result;
use crate::types::Encoding;

/// Blocking reads over a channel's read end.
///
/// A pty master shared with the stdin writer is non-blocking; a read that
/// would block waits in `poll` instead.
#[derive(Debug)]
struct ChannelReader(File);

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.0.read(buf) {
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    let mut fds = [PollFd::new(self.0.as_fd(), PollFlags::POLLIN)];
                    match poll(&mut fds, PollTimeout::NONE) {
                        Ok(_) | Err(Errno::EINTR) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                other => return other,
            }
        }
    }
}

#[derive(Debug)]
enum Source {
    Reader(BufReader<ChannelReader>),
    Buffered(VecDeque<Vec<u8>>),
    Closed,
}

#[derive(Debug)]
pub struct CaptureStream {
    source: Source,
    encoding: Encoding,
    chomp: bool,
    /// Reading from a pty master: `\r\n` line endings and `EIO` at the end.
    tty: bool,
}

impl CaptureStream {
    /// Lazy stream over the read end of a capture channel.
    pub fn from_fd(fd: OwnedFd, encoding: Encoding, chomp: bool, tty: bool) -> Self {
        Self {
            source: Source::Reader(BufReader::new(ChannelReader(File::from(fd)))),
            encoding,
            chomp,
            tty,
        }
    }

    /// Read everything from `fd` now and serve later reads from memory.
    ///
    /// Used on the foreground path so the child never blocks on a full pipe
    /// while the parent blocks in `wait`.
    pub fn drained(fd: OwnedFd, encoding: Encoding, chomp: bool, tty: bool) -> Result<Self> {
        let mut live = Self::from_fd(fd, encoding, chomp, tty);
        let mut lines = VecDeque::new();
        while let Some(line) = live.next_raw_line()? {
            lines.push_back(line);
        }
        trace!(lines = lines.len(), "drained capture channel");
        Ok(Self {
            source: Source::Buffered(lines),
            encoding,
            chomp,
            tty,
        })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.source, Source::Closed)
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.source, Source::Buffered(_))
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Read one line, stripping the terminator when `chomp` is set.
    pub fn readline(&mut self, chomp: bool) -> Result<Option<String>> {
        let Some(mut raw) = self.next_raw_line()? else {
            return Ok(None);
        };
        if chomp {
            self.strip_terminator(&mut raw);
        }
        Ok(Some(self.encoding.decode(&raw)))
    }

    /// All remaining lines, chomped according to the stream's default.
    pub fn readlines(&mut self) -> Result<Vec<String>> {
        let chomp = self.chomp;
        let mut out = Vec::new();
        while let Some(line) = self.readline(chomp)? {
            out.push(line);
        }
        Ok(out)
    }

    /// Drop the underlying descriptor or buffer. Later reads return `None`.
    pub fn close(&mut self) {
        self.source = Source::Closed;
    }

    fn next_raw_line(&mut self) -> Result<Option<Vec<u8>>> {
        let tty = self.tty;
        let line = match &mut self.source {
            Source::Closed => None,
            Source::Buffered(lines) => lines.pop_front(),
            Source::Reader(reader) => {
                let mut buf = Vec::new();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => None,
                    Ok(_) => Some(buf),
                    // A pty master reports EIO once the slave side is gone.
                    Err(e) if tty && e.raw_os_error() == Some(libc::EIO) => {
                        (!buf.is_empty()).then_some(buf)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        if line.is_none() {
            self.close();
        }
        Ok(line)
    }

    fn strip_terminator(&self, raw: &mut Vec<u8>) {
        if raw.last() == Some(&b'\n') {
            raw.pop();
            if self.tty && raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }
    }
}

/// Plain iteration yields chomped lines until the stream is exhausted.
impl Iterator for CaptureStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.readline(true).transpose()
    }
}

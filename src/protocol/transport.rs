use std::{
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
    net::TcpStream,
};

use thiserror::Error;

const TERMINATOR: &str = ".";

/// Longest accepted line in bytes, terminator included.
pub const MAX_LINE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
}

/// Escapes a body line so it cannot be mistaken for the block terminator.
pub fn stuff_line(line: &str) -> String {
    if line.starts_with('.') {
        format!(".{line}")
    } else {
        line.to_string()
    }
}

/// Reverses [`stuff_line`]: drops the first `.` of a line that begins with one.
pub fn unstuff_line(line: &str) -> &str {
    line.strip_prefix('.').unwrap_or(line)
}

/// Line framing over a byte stream.
///
/// Lines are written with a CRLF terminator. When reading, a line ends at LF and any
/// trailing CR/LF characters are stripped; bytes that are not valid UTF-8 are replaced
/// rather than rejected.
pub struct LineTransport<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl LineTransport<BufReader<TcpStream>, BufWriter<TcpStream>> {
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self::new(reader, BufWriter::new(stream)))
    }
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads one line. `Ok(None)` means the peer closed the stream, which is distinct
    /// from an empty line. A line longer than [`MAX_LINE`] is an error; the rest of the
    /// stream is left unread.
    pub fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        let mut buf = Vec::new();
        let read = (&mut self.reader)
            .take(MAX_LINE as u64)
            .read_until(b'\n', &mut buf)?;
        if read == 0 {
            return Ok(None);
        }
        if read == MAX_LINE && buf.last() != Some(&b'\n') {
            return Err(TransportError::LineTooLong(MAX_LINE));
        }

        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Reads lines up to a lone `.`, unstuffing each one. A stream closed before the
    /// terminator ends the block with whatever was read.
    pub fn read_dot_terminated_block(&mut self) -> Result<Vec<String>, TransportError> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line()? {
            if line == TERMINATOR {
                break;
            }
            lines.push(unstuff_line(&line).to_string());
        }
        Ok(lines)
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        Ok(())
    }

    /// Writes `lines` dot-stuffed, followed by the `.` terminator.
    pub fn write_dot_terminated_block<I, S>(&mut self, lines: I) -> Result<(), TransportError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.write_line(&stuff_line(line.as_ref()))?;
        }
        self.write_line(TERMINATOR)
    }

    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

//! JSONP / HTML envelopes around the published JSON payload.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::str::FromStr;

use thiserror::Error;

const JSONP_PREFIX: &[u8] = b"updateCenter.post(\n";
const JSONP_SUFFIX: &[u8] = b"\n);";

const HTML_PREFIX: &[u8] = b"<!DOCTYPE html><html><head><meta http-equiv='Content-Type' content='text/html;charset=UTF-8' /></head><body><script>window.onload = function () { window.parent.postMessage(JSON.stringify(\n";
const HTML_SUFFIX: &[u8] = b"\n),'*'); };</script></body></html>";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Source is shorter than the wrapper itself.
    #[error("Payload of {len} bytes is too short for the {envelope} envelope ({needed} bytes)")]
    TooShort {
        envelope: Envelope,
        len: u64,
        needed: u64,
    },

    #[error("Payload does not start with the {0} prefix")]
    PrefixMismatch(Envelope),

    #[error("Payload does not end with the {0} suffix")]
    SuffixMismatch(Envelope),

    #[error("Unknown envelope: {0}")]
    Unknown(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Wrapper format of a published or fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Envelope {
    /// `updateCenter.post(\n ... \n);`
    #[default]
    Jsonp,
    /// HTML shell that posts the payload to the parent window.
    Html,
    /// Plain JSON with no wrapper.
    Bare,
}

impl Envelope {
    pub fn prefix(self) -> &'static [u8] {
        match self {
            Envelope::Jsonp => JSONP_PREFIX,
            Envelope::Html => HTML_PREFIX,
            Envelope::Bare => b"",
        }
    }

    pub fn suffix(self) -> &'static [u8] {
        match self {
            Envelope::Jsonp => JSONP_SUFFIX,
            Envelope::Html => HTML_SUFFIX,
            Envelope::Bare => b"",
        }
    }

    fn overhead(self) -> u64 {
        (self.prefix().len() + self.suffix().len()) as u64
    }

    /// Prefix + payload + suffix.
    pub fn wrap(self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + self.overhead() as usize);
        out.extend_from_slice(self.prefix());
        out.extend_from_slice(payload);
        out.extend_from_slice(self.suffix());
        out
    }

    /// Borrow the payload out of an in-memory document.
    pub fn strip_bytes(self, data: &[u8]) -> Result<&[u8], EnvelopeError> {
        self.check_len(data.len() as u64)?;
        if !data.starts_with(self.prefix()) {
            return Err(EnvelopeError::PrefixMismatch(self));
        }
        if !data.ends_with(self.suffix()) {
            return Err(EnvelopeError::SuffixMismatch(self));
        }
        Ok(&data[self.prefix().len()..data.len() - self.suffix().len()])
    }

    /// Expose the payload of a seekable source as a stream.
    ///
    /// The total length is taken from the source itself.
    pub fn strip<R: Read + Seek>(self, mut source: R) -> Result<SectionReader<R>, EnvelopeError> {
        let len = source.seek(SeekFrom::End(0))?;
        self.strip_with_len(source, len)
    }

    /// Expose bytes `[prefix_len, total_len - suffix_len)` of `source` as a
    /// stream without buffering them. The wrapper bytes are checked first.
    /// Dropping the returned reader drops `source`.
    pub fn strip_with_len<R: Read + Seek>(
        self,
        mut source: R,
        total_len: u64,
    ) -> Result<SectionReader<R>, EnvelopeError> {
        self.check_len(total_len)?;

        let prefix = self.prefix();
        let suffix = self.suffix();
        let end = total_len - suffix.len() as u64;

        if !suffix.is_empty() {
            source.seek(SeekFrom::Start(end))?;
            if !read_matches(&mut source, suffix)? {
                return Err(EnvelopeError::SuffixMismatch(self));
            }
        }

        source.seek(SeekFrom::Start(0))?;
        if !read_matches(&mut source, prefix)? {
            return Err(EnvelopeError::PrefixMismatch(self));
        }

        Ok(SectionReader {
            inner: source,
            pos: prefix.len() as u64,
            end,
        })
    }

    fn check_len(self, len: u64) -> Result<(), EnvelopeError> {
        if len < self.overhead() {
            return Err(EnvelopeError::TooShort {
                envelope: self,
                len,
                needed: self.overhead(),
            });
        }
        Ok(())
    }
}

fn read_matches<R: Read>(source: &mut R, expected: &[u8]) -> io::Result<bool> {
    let mut buf = vec![0u8; expected.len()];
    source.read_exact(&mut buf)?;
    Ok(buf == expected)
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Jsonp => write!(f, "jsonp"),
            Envelope::Html => write!(f, "html"),
            Envelope::Bare => write!(f, "json"),
        }
    }
}

impl FromStr for Envelope {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsonp" => Ok(Envelope::Jsonp),
            "html" => Ok(Envelope::Html),
            "json" | "bare" | "none" => Ok(Envelope::Bare),
            other => Err(EnvelopeError::Unknown(other.to_string())),
        }
    }
}

/// Offset + length view over a seekable byte source.
#[derive(Debug)]
pub struct SectionReader<R> {
    inner: R,
    pos: u64,
    end: u64,
}

impl<R> SectionReader<R> {
    /// Bytes left in the section.
    pub fn remaining(&self) -> u64 {
        self.end - self.pos
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

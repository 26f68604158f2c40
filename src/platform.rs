//! Platform policy: output encoding and end-of-run console behaviour.
//!
//! The policy is chosen once at startup. The table writer only sees the
//! encoding it hands out, never the platform itself.

use std::io::{self, BufRead, Write};

use encoding_rs::{Encoder, EncoderResult, Encoding, UTF_8, WINDOWS_1251};

const SCRATCH_SIZE: usize = 4096;

/// Platform-dependent choices made once per run
pub trait PlatformPolicy: Send + Sync {
    /// Encoding applied to the output file
    fn output_encoding(&self) -> &'static Encoding;

    /// Called right before the process exits
    fn before_exit(&self) {}
}

/// UTF-8 output, no console interaction
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl PlatformPolicy for Passthrough {
    fn output_encoding(&self) -> &'static Encoding {
        UTF_8
    }
}

/// Windows-1251 output and a pause so a double-clicked console stays open
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyConsole;

impl PlatformPolicy for LegacyConsole {
    fn output_encoding(&self) -> &'static Encoding {
        WINDOWS_1251
    }

    fn before_exit(&self) {
        println!("Нажмите Enter для выхода...");
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    }
}

/// Policy for the platform this binary was built for
pub fn detect() -> Box<dyn PlatformPolicy> {
    if cfg!(windows) {
        Box::new(LegacyConsole)
    } else {
        Box::new(Passthrough)
    }
}

/// Look up an output encoding by WHATWG label (`utf-8`, `windows-1251`, `cp1251`, ...).
///
/// Decode-only encodings (UTF-16, `replacement`) are rejected since encoding_rs
/// would silently write UTF-8 for them.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .filter(|encoding| encoding.output_encoding() == *encoding)
}

/// `Write` adapter that re-encodes UTF-8 input into a target encoding.
///
/// Input may be split anywhere, including inside a multi-byte character.
/// Characters the target encoding cannot represent are written as `?`.
pub struct TranscodingWriter<W: Write> {
    inner: W,
    encoder: Option<Encoder>,
    pending: Vec<u8>,
    scratch: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    pub fn new(inner: W, encoding: &'static Encoding) -> Self {
        let encoder = (encoding != UTF_8).then(|| encoding.new_encoder());
        Self {
            inner,
            encoder,
            pending: Vec::new(),
            scratch: vec![0; SCRATCH_SIZE],
        }
    }

    /// Flush any encoder state and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "output ended inside a UTF-8 sequence",
            ));
        }
        if let Some(encoder) = self.encoder.as_mut() {
            encode_into(encoder, &mut self.scratch, &mut self.inner, "", true)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(encoder) = self.encoder.as_mut() else {
            return self.inner.write(buf);
        };

        self.pending.extend_from_slice(buf);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        };

        // The prefix was just validated; the tail is an incomplete character.
        let text = std::str::from_utf8(&self.pending[..valid])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        encode_into(encoder, &mut self.scratch, &mut self.inner, text, false)?;
        self.pending.drain(..valid);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn encode_into<W: Write>(
    encoder: &mut Encoder,
    scratch: &mut [u8],
    inner: &mut W,
    mut source: &str,
    last: bool,
) -> io::Result<()> {
    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(source, scratch, last);
        inner.write_all(&scratch[..written])?;
        source = &source[read..];

        match result {
            EncoderResult::InputEmpty => return Ok(()),
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => inner.write_all(b"?")?,
        }
    }
}

//! # Nvt
//!
//! NVT-ASCII plumbing for `TYPE A` transfers: CRLF/LF line-ending
//! translation and charset transcoding between the wire and the local
//! side. All converters are chunk-safe: state that may straddle a buffer
//! boundary (a trailing CR, an incomplete UTF-8 sequence) is carried over
//! to the next chunk.

use std::io::{self, BufRead};

use crate::types::Charset;

/// Collect the lines of a directory listing from a data stream: CRLF (or
/// bare LF) terminators stripped, text decoded through `charset`, empty
/// lines discarded.
pub(crate) fn read_lines<R: BufRead>(stream: &mut R, charset: Charset) -> io::Result<Vec<String>> {
    let mut lines: Vec<String> = Vec::new();
    loop {
        let mut raw: Vec<u8> = Vec::new();
        if stream.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        if raw.ends_with(b"\n") {
            raw.pop();
        }
        if raw.ends_with(b"\r") {
            raw.pop();
        }
        if raw.is_empty() {
            continue;
        }
        let line = charset.decode(&raw);
        trace!("DT IN: {line:?}");
        lines.push(line);
    }
    Ok(lines)
}

/// Append `byte` to `out` transcoded from `charset` to the local UTF-8
/// representation.
fn push_local(out: &mut Vec<u8>, byte: u8, charset: Charset) {
    if charset == Charset::Latin1 && byte >= 0x80 {
        out.push(0xC0 | (byte >> 6));
        out.push(0x80 | (byte & 0x3F));
    } else {
        out.push(byte);
    }
}

/// Decodes a textual download: CRLF on the wire becomes LF locally, wire
/// charset becomes UTF-8.
pub(crate) struct NvtDecoder {
    charset: Charset,
    pending_cr: bool,
}

impl NvtDecoder {
    pub fn new(charset: Charset) -> Self {
        Self {
            charset,
            pending_cr: false,
        }
    }

    pub fn decode_chunk(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                match byte {
                    b'\n' => out.push(b'\n'),
                    b'\r' => {
                        push_local(out, b'\r', self.charset);
                        self.pending_cr = true;
                    }
                    _ => {
                        push_local(out, b'\r', self.charset);
                        push_local(out, byte, self.charset);
                    }
                }
            } else if byte == b'\r' {
                self.pending_cr = true;
            } else {
                push_local(out, byte, self.charset);
            }
        }
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            out.push(b'\r');
        }
    }
}

/// Encodes a textual upload: local LF becomes CRLF on the wire, local
/// UTF-8 becomes the wire charset.
pub(crate) struct NvtEncoder {
    charset: Charset,
    carry: Vec<u8>,
    last_was_cr: bool,
}

impl NvtEncoder {
    pub fn new(charset: Charset) -> Self {
        Self {
            charset,
            carry: Vec::new(),
            last_was_cr: false,
        }
    }

    pub fn encode_chunk(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        match self.charset {
            Charset::Utf8 => self.convert_line_endings(chunk, out),
            Charset::Latin1 => {
                let mut buffer = std::mem::take(&mut self.carry);
                buffer.extend_from_slice(chunk);
                let mut converted = Vec::with_capacity(buffer.len() + 8);
                let mut rest = buffer.as_slice();
                loop {
                    match std::str::from_utf8(rest) {
                        Ok(text) => {
                            converted.extend_from_slice(&Charset::Latin1.encode(text));
                            rest = &[];
                            break;
                        }
                        Err(err) => {
                            let (valid, tail) = rest.split_at(err.valid_up_to());
                            // valid_up_to bytes are known-good UTF-8
                            let text = std::str::from_utf8(valid).unwrap_or_default();
                            converted.extend_from_slice(&Charset::Latin1.encode(text));
                            match err.error_len() {
                                Some(bad) => {
                                    converted.push(b'?');
                                    rest = &tail[bad..];
                                }
                                None => {
                                    // incomplete sequence, wait for the next chunk
                                    self.carry = tail.to_vec();
                                    rest = &[];
                                    break;
                                }
                            }
                        }
                    }
                }
                debug_assert!(rest.is_empty());
                self.convert_line_endings(&converted, out);
            }
        }
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if !self.carry.is_empty() {
            self.carry.clear();
            out.push(b'?');
        }
    }

    fn convert_line_endings(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        for &byte in chunk {
            if byte == b'\n' && !self.last_was_cr {
                out.extend_from_slice(b"\r\n");
            } else {
                out.push(byte);
            }
            self.last_was_cr = byte == b'\r';
        }
    }
}

#[cfg(test)]
mod test {

    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn decode_all(charset: Charset, chunks: &[&[u8]]) -> Vec<u8> {
        let mut decoder = NvtDecoder::new(charset);
        let mut out = Vec::new();
        for chunk in chunks {
            decoder.decode_chunk(chunk, &mut out);
        }
        decoder.finish(&mut out);
        out
    }

    fn encode_all(charset: Charset, chunks: &[&[u8]]) -> Vec<u8> {
        let mut encoder = NvtEncoder::new(charset);
        let mut out = Vec::new();
        for chunk in chunks {
            encoder.encode_chunk(chunk, &mut out);
        }
        encoder.finish(&mut out);
        out
    }

    #[test]
    fn should_collect_listing_lines() {
        let mut stream = Cursor::new(b"one\r\n\r\ntwo\r\nthree".to_vec());
        assert_eq!(
            read_lines(&mut stream, Charset::Utf8).unwrap(),
            vec!["one".to_string(), "two".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn should_decode_listing_lines_with_charset() {
        let mut stream = Cursor::new(b"caf\xe9\r\n".to_vec());
        assert_eq!(
            read_lines(&mut stream, Charset::Latin1).unwrap(),
            vec!["café".to_string()]
        );
    }

    #[test]
    fn should_convert_crlf_to_lf_on_download() {
        assert_eq!(
            decode_all(Charset::Utf8, &[b"one\r\ntwo\r\n"]),
            b"one\ntwo\n".to_vec()
        );
    }

    #[test]
    fn should_handle_crlf_split_across_chunks() {
        assert_eq!(
            decode_all(Charset::Utf8, &[b"one\r", b"\ntwo"]),
            b"one\ntwo".to_vec()
        );
    }

    #[test]
    fn should_keep_lone_cr_on_download() {
        assert_eq!(
            decode_all(Charset::Utf8, &[b"a\rb"]),
            b"a\rb".to_vec()
        );
        assert_eq!(decode_all(Charset::Utf8, &[b"tail\r"]), b"tail\r".to_vec());
    }

    #[test]
    fn should_expand_latin1_to_utf8_on_download() {
        assert_eq!(
            decode_all(Charset::Latin1, &[b"caf\xe9\r\n"]),
            "café\n".as_bytes().to_vec()
        );
    }

    #[test]
    fn should_convert_lf_to_crlf_on_upload() {
        assert_eq!(
            encode_all(Charset::Utf8, &[b"one\ntwo\n"]),
            b"one\r\ntwo\r\n".to_vec()
        );
    }

    #[test]
    fn should_not_double_existing_crlf_on_upload() {
        assert_eq!(
            encode_all(Charset::Utf8, &[b"one\r\ntwo"]),
            b"one\r\ntwo".to_vec()
        );
        // CRLF split across chunks stays a single CRLF
        assert_eq!(
            encode_all(Charset::Utf8, &[b"one\r", b"\ntwo"]),
            b"one\r\ntwo".to_vec()
        );
    }

    #[test]
    fn should_encode_latin1_upload_with_split_utf8_sequence() {
        let text = "café\n".as_bytes();
        // split inside the two-byte 'é' sequence
        let (head, tail) = text.split_at(4);
        assert_eq!(
            encode_all(Charset::Latin1, &[head, tail]),
            b"caf\xe9\r\n".to_vec()
        );
    }

    #[test]
    fn should_degrade_unmappable_input_on_upload() {
        assert_eq!(
            encode_all(Charset::Latin1, &["漢a".as_bytes()]),
            b"?a".to_vec()
        );
        // truncated sequence at end of stream
        assert_eq!(
            encode_all(Charset::Latin1, &[&"é".as_bytes()[..1]]),
            b"?".to_vec()
        );
    }
}

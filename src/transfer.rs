//! # Transfer
//!
//! Building blocks of the transfer engine: the byte pumps, the abort-lock
//! payload and the keep-alive ticker that NOOPs the control channel during
//! long transfers.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::channel::{self, SharedChannel};
use crate::command::Command;
use crate::connector::CloseHandle;
use crate::nvt::{NvtDecoder, NvtEncoder};
use crate::types::Charset;

/// Pump chunk size.
const BUFFER_SIZE: usize = 1024;

/// State guarded by the abort lock. `channel` and `data_closer` are only
/// populated while a transfer is in flight, so that a concurrent
/// [`abort_current_transfer`](crate::FtpClient::abort_current_transfer)
/// can negotiate `ABOR` and unblock the pump.
#[derive(Default)]
pub(crate) struct TransferState {
    pub ongoing: bool,
    pub aborted: bool,
    pub channel: Option<SharedChannel>,
    pub data_closer: Option<CloseHandle>,
}

impl TransferState {
    pub fn begin(&mut self, channel: SharedChannel, data_closer: CloseHandle) {
        self.ongoing = true;
        self.aborted = false;
        self.channel = Some(channel);
        self.data_closer = Some(data_closer);
    }

    pub fn end(&mut self) {
        self.ongoing = false;
        self.aborted = false;
        self.channel = None;
        self.data_closer = None;
    }
}

/// Background task sending `NOOP` on the control channel while a transfer
/// runs. The NOOP send and its reply are one atomic exchange under the
/// channel lock, so they can never interleave with the trailing transfer
/// reply. Every error is swallowed: transfer status travels on the data
/// channel.
pub(crate) struct KeepAliveTicker {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl KeepAliveTicker {
    /// Starts the ticker; returns `None` when the delay is zero
    /// (keep-alive disabled).
    pub fn start(channel: SharedChannel, delay: Duration) -> Option<Self> {
        if delay.is_zero() {
            return None;
        }
        let (stop, wake) = mpsc::channel::<()>();
        let spawned = std::thread::Builder::new()
            .name("ftp-keepalive".to_string())
            .spawn(move || loop {
                match wake.recv_timeout(delay) {
                    Err(RecvTimeoutError::Timeout) => {
                        let mut channel = channel::lock(&channel);
                        let outcome = channel
                            .send_command(&Command::Noop)
                            .and_then(|_| channel.read_reply().map(|_| ()));
                        if let Err(err) = outcome {
                            debug!("keep-alive NOOP failed: {err}");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });
        match spawned {
            Ok(thread) => Some(Self { stop, thread }),
            Err(err) => {
                warn!("could not spawn the keep-alive ticker: {err}");
                None
            }
        }
    }

    /// Cancels the ticker and waits for its termination.
    pub fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.thread.join();
    }
}

/// Skip `offset` bytes of `src` by reading them off.
pub(crate) fn skip_bytes(src: &mut dyn Read, offset: u64) -> io::Result<()> {
    let skipped = io::copy(&mut src.take(offset), &mut io::sink())?;
    if skipped < offset {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "end of stream reached while skipping",
        ));
    }
    Ok(())
}

/// Binary download: copy from the data connection to `dst` until EOF.
pub(crate) fn pump_binary_download(
    src: &mut dyn Read,
    dst: &mut dyn Write,
    progress: &mut dyn FnMut(usize),
) -> io::Result<()> {
    let mut buffer = [0u8; BUFFER_SIZE];
    loop {
        let n = src.read(&mut buffer)?;
        if n == 0 {
            break dst.flush();
        }
        dst.write_all(&buffer[..n])?;
        progress(n);
    }
}

/// Binary upload: copy exactly `length` bytes from `src` to the data
/// connection. Running out of input early is an error.
pub(crate) fn pump_binary_upload(
    src: &mut dyn Read,
    dst: &mut dyn Write,
    length: u64,
    progress: &mut dyn FnMut(usize),
) -> io::Result<()> {
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut done: u64 = 0;
    while done < length {
        let want = BUFFER_SIZE.min((length - done) as usize);
        let n = src.read(&mut buffer[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of stream reached",
            ));
        }
        dst.write_all(&buffer[..n])?;
        done += n as u64;
        progress(n);
    }
    dst.flush()
}

/// Textual download: NVT-ASCII from the data connection, local text to
/// `dst`.
pub(crate) fn pump_textual_download(
    src: &mut dyn Read,
    dst: &mut dyn Write,
    charset: Charset,
    progress: &mut dyn FnMut(usize),
) -> io::Result<()> {
    let mut decoder = NvtDecoder::new(charset);
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut out: Vec<u8> = Vec::with_capacity(BUFFER_SIZE + 8);
    loop {
        let n = src.read(&mut buffer)?;
        if n == 0 {
            out.clear();
            decoder.finish(&mut out);
            dst.write_all(&out)?;
            break dst.flush();
        }
        out.clear();
        decoder.decode_chunk(&buffer[..n], &mut out);
        dst.write_all(&out)?;
        progress(n);
    }
}

/// Textual upload: exactly `length` bytes of local text from `src`,
/// NVT-ASCII to the data connection. Progress reports source bytes, before
/// conversion.
pub(crate) fn pump_textual_upload(
    src: &mut dyn Read,
    dst: &mut dyn Write,
    length: u64,
    charset: Charset,
    progress: &mut dyn FnMut(usize),
) -> io::Result<()> {
    let mut encoder = NvtEncoder::new(charset);
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut out: Vec<u8> = Vec::with_capacity(BUFFER_SIZE + 8);
    let mut done: u64 = 0;
    while done < length {
        let want = BUFFER_SIZE.min((length - done) as usize);
        let n = src.read(&mut buffer[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of stream reached",
            ));
        }
        out.clear();
        encoder.encode_chunk(&buffer[..n], &mut out);
        dst.write_all(&out)?;
        done += n as u64;
        progress(n);
    }
    out.clear();
    encoder.finish(&mut out);
    dst.write_all(&out)?;
    dst.flush()
}

#[cfg(test)]
mod test {

    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::channel::ControlChannel;
    use crate::connector::{CloseHandle, Connection};

    #[test]
    fn should_pump_binary_download_with_progress() {
        let payload = vec![7u8; 3000];
        let mut src = Cursor::new(payload.clone());
        let mut dst = Vec::new();
        let mut chunks = Vec::new();
        pump_binary_download(&mut src, &mut dst, &mut |n| chunks.push(n)).unwrap();
        assert_eq!(dst, payload);
        assert_eq!(chunks, vec![1024, 1024, 952]);
    }

    #[test]
    fn should_pump_binary_upload_bounded() {
        let mut src = Cursor::new(vec![1u8; 5000]);
        let mut dst = Vec::new();
        let mut total = 0;
        pump_binary_upload(&mut src, &mut dst, 2048, &mut |n| total += n).unwrap();
        assert_eq!(dst.len(), 2048);
        assert_eq!(total, 2048);
    }

    #[test]
    fn binary_upload_fails_on_early_eof() {
        let mut src = Cursor::new(vec![1u8; 10]);
        let mut dst = Vec::new();
        let err = pump_binary_upload(&mut src, &mut dst, 2048, &mut |_| ()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn should_pump_textual_both_ways() {
        let mut src = Cursor::new(b"uno\r\ndue\r\n".to_vec());
        let mut dst = Vec::new();
        pump_textual_download(&mut src, &mut dst, Charset::Utf8, &mut |_| ()).unwrap();
        assert_eq!(dst, b"uno\ndue\n".to_vec());

        let local = b"uno\ndue\n".to_vec();
        let mut src = Cursor::new(local.clone());
        let mut dst = Vec::new();
        pump_textual_upload(
            &mut src,
            &mut dst,
            local.len() as u64,
            Charset::Utf8,
            &mut |_| (),
        )
        .unwrap();
        assert_eq!(dst, b"uno\r\ndue\r\n".to_vec());
    }

    #[test]
    fn should_skip_bytes() {
        let mut src = Cursor::new(b"0123456789".to_vec());
        skip_bytes(&mut src, 4).unwrap();
        let mut rest = String::new();
        src.read_to_string(&mut rest).unwrap();
        assert_eq!(rest.as_str(), "456789");

        let mut src = Cursor::new(b"01".to_vec());
        assert!(skip_bytes(&mut src, 4).is_err());
    }

    // -- ticker

    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FakeStream {
        input: Cursor<Vec<u8>>,
        output: SharedSink,
    }

    impl io::Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl io::Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.output.flush()
        }
    }

    #[test]
    fn ticker_disabled_on_zero_delay() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let stream = FakeStream {
            input: Cursor::new(Vec::new()),
            output: SharedSink(written),
        };
        let channel =
            ControlChannel::new(Connection::new(stream, CloseHandle::noop()), Charset::Utf8, vec![])
                .into_shared();
        assert!(KeepAliveTicker::start(channel, Duration::ZERO).is_none());
    }

    #[test]
    fn ticker_sends_noop_and_stops() {
        crate::log_init();
        let written = Arc::new(Mutex::new(Vec::new()));
        let stream = FakeStream {
            input: Cursor::new(b"200 ok\r\n200 ok\r\n200 ok\r\n200 ok\r\n".to_vec()),
            output: SharedSink(written.clone()),
        };
        let channel =
            ControlChannel::new(Connection::new(stream, CloseHandle::noop()), Charset::Utf8, vec![])
                .into_shared();
        let ticker = KeepAliveTicker::start(channel, Duration::from_millis(20)).unwrap();
        std::thread::sleep(Duration::from_millis(90));
        ticker.stop();
        let wire = written.lock().unwrap().clone();
        assert!(wire.starts_with(b"NOOP\r\n"));
    }
}

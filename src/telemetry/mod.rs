//! Level-gated formatted logging layered on [`crate::mpsc`]: each call
//! formats a timestamped, producer-tagged record straight into a reserved
//! slot of the underlying record log — no intermediate allocation — and a
//! separate [`Logger::flush`] drains published records out to a
//! [`FlushSink`].

use std::fmt;

use crate::mpsc::{Mpsc, ProducerHandle};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Level {
    Data,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Sync,
    Async,
}

/// Sole destination for a flushed, fully formatted log line (prefix plus
/// payload already concatenated). Stands in for the original's
/// function-pointer flush callback.
pub trait FlushSink {
    fn flush(&mut self, bytes: &[u8]);
}

const HEADER_LEN: usize = 20;

struct CountingWriter(usize);

impl fmt::Write for CountingWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

/// A level-gated facade over an [`Mpsc`] record log.
pub struct Logger<'a> {
    mode: Mode,
    level: Level,
    mpsc: Mpsc<'a>,
    /// Scratch buffer `flush` renders `"[ts][id]"` plus the payload into
    /// before handing the line to a [`FlushSink`]. Sized once at
    /// construction, reused across calls.
    flush_buf: Vec<u8>,
    busy: bool,
}

impl<'a> Logger<'a> {
    pub fn new(mode: Mode, level: Level, mpsc: Mpsc<'a>, flush_cap: usize) -> Self {
        Self {
            mode,
            level,
            mpsc,
            flush_buf: vec![0u8; flush_cap],
            busy: false,
        }
    }

    pub fn register(&self, id: usize) -> crate::error::Result<ProducerHandle> {
        self.mpsc.register(id)
    }

    pub fn unregister(&self, handle: ProducerHandle) {
        self.mpsc.unregister(handle)
    }

    /// Writes one record if `level` is at or above the logger's configured
    /// floor. Returns `false` if the record was dropped (gated out, too
    /// large for the arena, or the consumer hasn't drained far enough).
    pub fn log(
        &self,
        level: Level,
        id: usize,
        handle: &ProducerHandle,
        ts: u64,
        args: fmt::Arguments,
    ) -> bool {
        if level < self.level {
            return false;
        }

        let mut counter = CountingWriter(0);
        let _ = fmt::write(&mut counter, args);
        let msg_len = counter.0;
        let total = HEADER_LEN + msg_len;

        let offset = match self.mpsc.acquire(handle, total) {
            Some(offset) => offset,
            None => return false,
        };

        let dst = unsafe { self.mpsc.reserved_mut(offset, total) };
        dst[0..8].copy_from_slice(&ts.to_le_bytes());
        dst[8..16].copy_from_slice(&(id as u64).to_le_bytes());
        dst[16..20].copy_from_slice(&(msg_len as u32).to_le_bytes());

        let mut w = SliceWriter {
            buf: &mut dst[HEADER_LEN..],
            pos: 0,
        };
        let _ = fmt::write(&mut w, args);

        self.mpsc.publish(handle);
        true
    }

    pub fn data(&self, id: usize, handle: &ProducerHandle, ts: u64, args: fmt::Arguments) -> bool {
        self.log(Level::Data, id, handle, ts, args)
    }
    pub fn debug(&self, id: usize, handle: &ProducerHandle, ts: u64, args: fmt::Arguments) -> bool {
        self.log(Level::Debug, id, handle, ts, args)
    }
    pub fn info(&self, id: usize, handle: &ProducerHandle, ts: u64, args: fmt::Arguments) -> bool {
        self.log(Level::Info, id, handle, ts, args)
    }
    pub fn warn(&self, id: usize, handle: &ProducerHandle, ts: u64, args: fmt::Arguments) -> bool {
        self.log(Level::Warn, id, handle, ts, args)
    }
    pub fn error(&self, id: usize, handle: &ProducerHandle, ts: u64, args: fmt::Arguments) -> bool {
        self.log(Level::Error, id, handle, ts, args)
    }

    /// Drains and renders published records one at a time. In `Async` mode
    /// stops after the first record and sets the busy latch; the caller's
    /// transport should call [`Logger::clear_busy`] once that record has
    /// actually gone out, letting the next `flush` call proceed.
    pub fn flush(&mut self, sink: &mut impl FlushSink) {
        loop {
            if self.busy {
                break;
            }
            let (offset, avail) = self.mpsc.consume();
            if avail < HEADER_LEN {
                break;
            }
            let header = self.mpsc.drained(offset, HEADER_LEN);
            let ts = u64::from_le_bytes(header[0..8].try_into().unwrap());
            let id = u64::from_le_bytes(header[8..16].try_into().unwrap());
            let msg_len = u32::from_le_bytes(header[16..20].try_into().unwrap()) as usize;
            if HEADER_LEN + msg_len > avail {
                break;
            }
            let msg = self.mpsc.drained(offset + HEADER_LEN, msg_len).to_vec();

            let prefix_len = {
                let mut w = SliceWriter {
                    buf: &mut self.flush_buf,
                    pos: 0,
                };
                let _ = write!(w, "[{ts}][{id}]");
                w.pos
            };
            let copy_len = msg_len.min(self.flush_buf.len().saturating_sub(prefix_len));
            self.flush_buf[prefix_len..prefix_len + copy_len].copy_from_slice(&msg[..copy_len]);

            sink.flush(&self.flush_buf[..prefix_len + copy_len]);
            self.mpsc.release(HEADER_LEN + msg_len);
            self.busy = self.mode == Mode::Async;
        }
    }

    pub fn clear_busy(&mut self) {
        self.busy = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpsc::ProducerSlot;

    struct VecSink(Vec<String>);
    impl FlushSink for VecSink {
        fn flush(&mut self, bytes: &[u8]) {
            self.0.push(String::from_utf8_lossy(bytes).into_owned());
        }
    }

    #[test]
    fn below_floor_records_are_dropped() {
        let producers = vec![ProducerSlot::new()];
        let mut buf = vec![0u8; 256];
        let mpsc = Mpsc::new(&mut buf, &producers);
        let logger = Logger::new(Mode::Sync, Level::Warn, mpsc, 64);
        let handle = logger.register(0).unwrap();
        assert!(!logger.debug(0, &handle, 1, format_args!("ignored")));
    }

    #[test]
    fn sync_mode_drains_every_record_in_one_flush_call() {
        let producers = vec![ProducerSlot::new()];
        let mut buf = vec![0u8; 256];
        let mpsc = Mpsc::new(&mut buf, &producers);
        let mut logger = Logger::new(Mode::Sync, Level::Data, mpsc, 64);
        let handle = logger.register(0).unwrap();

        assert!(logger.info(0, &handle, 100, format_args!("hello {}", 1)));
        assert!(logger.info(0, &handle, 200, format_args!("world")));

        let mut sink = VecSink(Vec::new());
        logger.flush(&mut sink);

        assert_eq!(sink.0, vec!["[100][0]hello 1", "[200][0]world"]);
    }

    #[test]
    fn async_mode_stops_after_one_record_until_busy_is_cleared() {
        let producers = vec![ProducerSlot::new()];
        let mut buf = vec![0u8; 256];
        let mpsc = Mpsc::new(&mut buf, &producers);
        let mut logger = Logger::new(Mode::Async, Level::Data, mpsc, 64);
        let handle = logger.register(0).unwrap();

        assert!(logger.info(0, &handle, 1, format_args!("a")));
        assert!(logger.info(0, &handle, 2, format_args!("b")));

        let mut sink = VecSink(Vec::new());
        logger.flush(&mut sink);
        assert_eq!(sink.0, vec!["[1][0]a"]);

        logger.flush(&mut sink);
        assert_eq!(sink.0.len(), 1);

        logger.clear_busy();
        logger.flush(&mut sink);
        assert_eq!(sink.0, vec!["[1][0]a", "[2][0]b"]);
    }
}

#![allow(dead_code)]

pub mod site;
pub mod spy;

use std::io;
use std::sync::{Arc, Mutex};

/// `io::Write` into a shared buffer, for asserting on emitted logs.
pub struct LogWriter(pub Arc<Mutex<Vec<u8>>>);

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

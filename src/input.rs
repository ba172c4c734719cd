//! Scanner input.
//!
//! QR scanners at the gate behave like keyboards: each scan arrives as one
//! line on stdin. Lines are read on a helper thread so the control loop can
//! wait with a timeout and notice a shutdown while nobody is scanning.
//!
//! Lines are decoded lossily: a garbled scan becomes a code that matches
//! no ticket instead of an input error.

use crate::GateError;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// One step of scanner input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A raw line from the scanner, untrimmed.
    Code(String),
    /// Nothing arrived within the wait.
    Idle,
    /// The input has ended.
    Closed,
}

/// Source of scanned codes.
pub trait ScanSource {
    /// Wait up to `wait` for the next scan.
    fn next_event(&mut self, wait: Duration) -> Result<ScanEvent, GateError>;
}

/// Line-oriented scanner fed by a background reader thread.
pub struct LineScanner {
    lines: Receiver<io::Result<String>>,
}

impl LineScanner {
    /// Read scans from standard input.
    pub fn stdin() -> Self {
        Self::spawn(io::BufReader::new(io::stdin()))
    }

    /// Read scans from any line reader.
    pub fn spawn<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = reader;
            loop {
                match read_line_lossy(&mut reader) {
                    Ok(Some(line)) => {
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });
        Self { lines: rx }
    }
}

/// Read one line without its terminator. `None` at end of input.
fn read_line_lossy<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

impl ScanSource for LineScanner {
    fn next_event(&mut self, wait: Duration) -> Result<ScanEvent, GateError> {
        match self.lines.recv_timeout(wait) {
            Ok(Ok(line)) => Ok(ScanEvent::Code(line)),
            Ok(Err(e)) => Err(GateError::InputError(format!("Failed to read scan: {}", e))),
            Err(RecvTimeoutError::Timeout) => Ok(ScanEvent::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(ScanEvent::Closed),
        }
    }
}

/// Scanner that replays a fixed list of events, then reports `Closed`.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Default)]
pub struct ScriptedScanner {
    events: std::collections::VecDeque<ScanEvent>,
}

#[cfg(any(test, feature = "test-seams"))]
impl ScriptedScanner {
    /// Replay `codes` as scans.
    pub fn codes(codes: &[&str]) -> Self {
        Self::events(codes.iter().map(|c| ScanEvent::Code(c.to_string())).collect())
    }

    /// Replay arbitrary events.
    pub fn events(events: Vec<ScanEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl ScanSource for ScriptedScanner {
    fn next_event(&mut self, _wait: Duration) -> Result<ScanEvent, GateError> {
        Ok(self.events.pop_front().unwrap_or(ScanEvent::Closed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_line_scanner_yields_lines_then_closes() {
        let mut scanner = LineScanner::spawn(Cursor::new("T1\n  T2 \n\n"));

        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Code("T1".into()));
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Code("  T2 ".into()));
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Code("".into()));
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Closed);
    }

    #[test]
    fn test_line_scanner_idles_while_waiting() {
        let (_tx, rx) = mpsc::channel();
        let mut scanner = LineScanner { lines: rx };
        assert_eq!(
            scanner.next_event(Duration::from_millis(5)).unwrap(),
            ScanEvent::Idle
        );
    }

    #[test]
    fn test_line_scanner_survives_invalid_utf8() {
        let mut scanner = LineScanner::spawn(Cursor::new(b"T\xE9\nT1\r\n".to_vec()));

        assert_eq!(
            scanner.next_event(WAIT).unwrap(),
            ScanEvent::Code("T\u{FFFD}".into())
        );
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Code("T1".into()));
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Closed);
    }

    #[test]
    fn test_line_scanner_last_line_without_newline() {
        let mut scanner = LineScanner::spawn(Cursor::new("T1\nT2"));
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Code("T1".into()));
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Code("T2".into()));
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Closed);
    }

    struct BrokenReader;

    impl io::Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device unplugged"))
        }
    }

    #[test]
    fn test_line_scanner_reports_read_errors() {
        let mut scanner = LineScanner::spawn(io::BufReader::new(BrokenReader));
        assert!(matches!(
            scanner.next_event(WAIT),
            Err(GateError::InputError(_))
        ));
    }

    #[test]
    fn test_scripted_scanner() {
        let mut scanner = ScriptedScanner::codes(&["A"]);
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Code("A".into()));
        assert_eq!(scanner.next_event(WAIT).unwrap(), ScanEvent::Closed);
    }
}

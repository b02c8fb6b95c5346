//! Link status derived from the tail of the SvxLink log.
//!
//! Each poll re-reads the last few lines and folds them, oldest first, into a
//! fresh [`LinkStatus`]. Nothing is carried between polls.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const CONFERENCE_MARKER: &str = "chat message received from";
const CONFERENCE_START: &str = "from";
const CONFERENCE_END: &str = "---";
const SPEAKER_SEPARATOR: &str = "->";
const TX_ON_MARKER: &str = "Turning the transmitter ON";
const TX_OFF_MARKER: &str = "Turning the transmitter OFF";

pub const DEFAULT_CONFERENCE: &str = "WAITING";
pub const DEFAULT_SPEAKER: &str = "NONE";
pub const UNPARSEABLE: &str = "unparseable";

const TAIL_CHUNK: usize = 4096;
const TAIL_MAX_BYTES: u64 = 64 * 1024;

/// Transmitter state. Holding it as one value keeps TX and RX exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioState {
    #[default]
    Receiving,
    Transmitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub conference: String,
    pub speaker: String,
    pub radio: RadioState,
}

impl Default for LinkStatus {
    fn default() -> Self {
        LinkStatus {
            conference: DEFAULT_CONFERENCE.to_string(),
            speaker: DEFAULT_SPEAKER.to_string(),
            radio: RadioState::Receiving,
        }
    }
}

impl LinkStatus {
    pub fn transmitting(&self) -> bool {
        self.radio == RadioState::Transmitting
    }

    pub fn receiving(&self) -> bool {
        self.radio == RadioState::Receiving
    }

    /// Applies every rule that matches `line`; later lines override earlier ones.
    pub fn apply_line(&mut self, line: &str) {
        if line.contains(CONFERENCE_MARKER) {
            self.conference = match conference_of(line) {
                Field::Found(name) => name.to_string(),
                Field::Unparseable => UNPARSEABLE.to_string(),
            };
        }

        if let Some((_, rest)) = line.split_once(SPEAKER_SEPARATOR) {
            self.speaker = rest.trim().to_string();
        }

        if line.contains(TX_ON_MARKER) {
            self.radio = RadioState::Transmitting;
        } else if line.contains(TX_OFF_MARKER) {
            self.radio = RadioState::Receiving;
        }
    }
}

/// Result of pulling a delimited field out of a log line.
#[derive(Debug, PartialEq, Eq)]
enum Field<'a> {
    Found(&'a str),
    Unparseable,
}

fn conference_of(line: &str) -> Field<'_> {
    let Some((_, after_from)) = line.split_once(CONFERENCE_START) else {
        return Field::Unparseable;
    };
    match after_from.split_once(CONFERENCE_END) {
        Some((name, _)) => Field::Found(name.trim()),
        None => Field::Unparseable,
    }
}

pub fn parse_lines<'a, I>(lines: I) -> LinkStatus
where
    I: IntoIterator<Item = &'a str>,
{
    let mut status = LinkStatus::default();
    for line in lines {
        status.apply_line(line);
    }
    status
}

/// Reads at most the last `n` lines of `path`, scanning backwards so the cost
/// is bounded no matter how large the log has grown.
pub fn tail_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    if file.metadata()?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is a directory", path.display()),
        ));
    }
    let len = file.seek(SeekFrom::End(0))?;
    let floor = len.saturating_sub(TAIL_MAX_BYTES);

    let mut pos = len;
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; TAIL_CHUNK];

    while pos > floor {
        let read_len = (pos - floor).min(TAIL_CHUNK as u64) as usize;
        pos -= read_len as u64;
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk[..read_len])?;
        let mut joined = chunk[..read_len].to_vec();
        joined.extend_from_slice(&buf);
        buf = joined;

        // n lines need n newlines before the last line's start; one extra
        // guarantees the oldest kept line is complete.
        if buf.iter().filter(|&&b| b == b'\n').count() > n {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<&str> = text.lines().collect();
    // Unless we reached the start of the file, the first line is a fragment
    if pos > 0 && !lines.is_empty() {
        lines.remove(0);
    }
    let skip = lines.len().saturating_sub(n);
    Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
}

/// Candidate log locations, tried in order.
#[derive(Debug, Clone)]
pub struct LogSource {
    candidates: Vec<PathBuf>,
    tail: usize,
}

impl LogSource {
    pub fn new(candidates: Vec<PathBuf>, tail: usize) -> Self {
        LogSource { candidates, tail }
    }

    /// First candidate that is present. Only `NotFound` moves on to the next
    /// one; any other failure to stat a candidate is returned as is.
    pub fn locate(&self) -> io::Result<Option<&Path>> {
        for path in &self.candidates {
            match fs::metadata(path) {
                Ok(_) => return Ok(Some(path.as_path())),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Never fails: a missing log is the idle default, a read error is shown
    /// in the speaker field.
    pub fn extract(&self) -> LinkStatus {
        let read = self.locate().and_then(|found| match found {
            Some(path) => tail_lines(path, self.tail).map(Some),
            None => Ok(None),
        });

        match read {
            Ok(Some(lines)) => parse_lines(lines.iter().map(String::as_str)),
            Ok(None) => LinkStatus::default(),
            Err(e) => LinkStatus {
                speaker: format!("Log error: {}", e),
                ..LinkStatus::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    fn write_log(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_no_marker_is_default() {
        let status = parse_lines([
            "Tue Oct 13 10:00:01 2026: SimplexLogic: Logic started",
            "Tue Oct 13 10:00:02 2026: Tx1: Setting up",
        ]);
        assert_eq!(status, LinkStatus::default());
        assert!(status.receiving());
        assert!(!status.transmitting());
    }

    #[test]
    fn test_conference_is_trimmed() {
        let status = parse_lines(["... chat message received from ALPHA --- rest"]);
        assert_eq!(status.conference, "ALPHA");
    }

    #[test]
    fn test_conference_missing_delimiter() {
        let status = parse_lines(["EchoLink chat message received from *BRAZIL* no dashes"]);
        assert_eq!(status.conference, UNPARSEABLE);
    }

    #[test]
    fn test_conference_last_match_wins() {
        let status = parse_lines([
            "EchoLink chat message received from *ONE* --- hi",
            "EchoLink chat message received from *TWO* --- hi",
        ]);
        assert_eq!(status.conference, "*TWO*");
    }

    #[test]
    fn test_speaker_after_separator() {
        let status = parse_lines(["NODE1 -> NODE2"]);
        assert_eq!(status.speaker, "NODE2");

        let status = parse_lines(["a -> b -> c  "]);
        assert_eq!(status.speaker, "b -> c");
    }

    #[test]
    fn test_transmitter_last_wins() {
        let status = parse_lines([
            "10:00:00: Tx1: Turning the transmitter ON",
            "10:00:09: Tx1: Turning the transmitter OFF",
        ]);
        assert!(!status.transmitting());
        assert!(status.receiving());

        let status = parse_lines([
            "10:00:09: Tx1: Turning the transmitter OFF",
            "10:00:10: Tx1: Turning the transmitter ON",
        ]);
        assert!(status.transmitting());
        assert!(!status.receiving());
    }

    #[test]
    fn test_fields_are_independent() {
        let status = parse_lines([
            "EchoLink chat message received from *PT-BR* --- CONF",
            "Tx1: Turning the transmitter ON",
            "unrelated noise",
        ]);
        assert_eq!(status.conference, "*PT-BR*");
        assert_eq!(status.speaker, DEFAULT_SPEAKER);
        assert!(status.transmitting());
    }

    #[test]
    fn test_tail_lines_keeps_last() {
        let lines: Vec<String> = (0..50).map(|i| format!("line {}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = write_log(&refs);

        let tail = tail_lines(file.path(), 20).unwrap();
        assert_eq!(tail.len(), 20);
        assert_eq!(tail[0], "line 30");
        assert_eq!(tail[19], "line 49");
    }

    #[test]
    fn test_tail_lines_short_file() {
        let file = write_log(&["only", "two"]);
        assert_eq!(tail_lines(file.path(), 20).unwrap(), vec!["only", "two"]);
    }

    #[test]
    fn test_tail_lines_long_lines_cross_chunks() {
        let long = "x".repeat(TAIL_CHUNK * 2);
        let file = write_log(&[long.as_str(), "Tx1: Turning the transmitter ON", long.as_str()]);
        let tail = tail_lines(file.path(), 2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0], "Tx1: Turning the transmitter ON");
        assert_eq!(tail[1].len(), long.len());
    }

    #[test]
    fn test_tail_lines_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"bad \xff byte\nNODE1 -> NODE2\n").unwrap();
        let tail = tail_lines(file.path(), 20).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(parse_lines(tail.iter().map(String::as_str)).speaker, "NODE2");
    }

    #[test]
    fn test_extract_only_sees_window() {
        let mut lines = vec!["Tx1: Turning the transmitter ON"];
        lines.extend(std::iter::repeat("noise").take(25));
        let file = write_log(&lines);

        let source = LogSource::new(vec![file.path().to_path_buf()], 20);
        assert_eq!(source.extract(), LinkStatus::default());
    }

    #[test]
    fn test_extract_uses_fallback_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_log(&["NODE1 -> PY7XYZ"]);

        let source = LogSource::new(
            vec![dir.path().join("svxlink.log"), file.path().to_path_buf()],
            20,
        );
        assert_eq!(source.locate().unwrap(), Some(file.path()));
        assert_eq!(source.extract().speaker, "PY7XYZ");
    }

    #[test]
    fn test_extract_missing_log_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let source = LogSource::new(
            vec![dir.path().join("svxlink.log"), dir.path().join("svxlink/svxlink.log")],
            20,
        );
        assert_eq!(source.locate().unwrap(), None);
        assert_eq!(source.extract(), LinkStatus::default());
    }

    #[test]
    fn test_extract_read_error_marks_speaker() {
        // A directory exists but cannot be read as a log
        let dir = tempfile::tempdir().unwrap();
        let source = LogSource::new(vec![dir.path().to_path_buf()], 20);

        let status = source.extract();
        assert!(status.speaker.starts_with("Log error: "));
        assert_eq!(status.conference, DEFAULT_CONFERENCE);
        assert!(status.receiving());
    }

    #[test]
    fn test_extract_unreachable_log_marks_speaker() {
        // Stat fails with something other than NotFound (ENOTDIR here); root
        // ignores permission bits, so EACCES can't be staged in a test
        let file = write_log(&["NODE1 -> PY7XYZ"]);
        let source = LogSource::new(vec![file.path().join("svxlink.log")], 20);

        assert!(source.locate().is_err());
        let status = source.extract();
        assert!(status.speaker.starts_with("Log error: "));
        assert_eq!(status.conference, DEFAULT_CONFERENCE);
    }

    #[test]
    fn test_unreachable_candidate_is_not_skipped() {
        let blocker = write_log(&["noise"]);
        let real = write_log(&["NODE1 -> PY7XYZ"]);
        let source = LogSource::new(
            vec![blocker.path().join("svxlink.log"), real.path().to_path_buf()],
            20,
        );
        assert!(source.extract().speaker.starts_with("Log error: "));
    }

    fn log_line() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Tx1: Turning the transmitter ON".to_string()),
            Just("Tx1: Turning the transmitter OFF".to_string()),
            Just("EchoLink chat message received from X --- y".to_string()),
            Just("A -> B".to_string()),
            "[a-zA-Z0-9 :]{0,40}",
        ]
    }

    proptest! {
        #[test]
        fn prop_tx_rx_exclusive(lines in prop::collection::vec(log_line(), 0..30)) {
            let status = parse_lines(lines.iter().map(String::as_str));
            prop_assert!(status.transmitting() != status.receiving());
        }

        #[test]
        fn prop_plain_lines_are_default(lines in prop::collection::vec("[a-zA-Z0-9 :.]{0,60}", 0..30)) {
            let status = parse_lines(lines.iter().map(String::as_str));
            prop_assert_eq!(status, LinkStatus::default());
        }
    }
}

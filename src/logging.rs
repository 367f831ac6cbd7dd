//! # Log Sinks Module
//!
//! The server keeps two append-only line logs:
//! - **general**: every session event, mirrored to the console through `log`
//! - **alert**: abnormal-condition alert lines only
//!
//! ## Architecture
//! - `LogSinks`: Cheap cloneable handle shared by every session
//! - **Writer Thread**: Owns both files and appends lines one at a time
//!
//! Lines from concurrent sessions are funnelled through a single channel, so
//! each line lands whole and in submission order.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::LogError;

/// Install the console logger, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_console() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    General,
    Alert,
}

enum SinkCommand {
    Line { sink: Sink, text: String },
    /// Reply once every earlier line has been written
    Flush(Sender<()>),
    Stop,
}

struct SinksInner {
    sender: Sender<SinkCommand>,
    writer: Mutex<Option<thread::JoinHandle<()>>>,
    general_path: PathBuf,
    alert_path: PathBuf,
}

impl SinksInner {
    fn shutdown(&self) {
        let handle = match self.writer.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            let _ = self.sender.send(SinkCommand::Stop);
            if handle.join().is_err() {
                log::error!("Log writer thread panicked");
            }
        }
    }
}

impl Drop for SinksInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Clone)]
pub struct LogSinks {
    inner: Arc<SinksInner>,
}

impl LogSinks {
    /// Open (creating if needed) both log files for appending and start the writer.
    pub fn setup(general_path: impl AsRef<Path>, alert_path: impl AsRef<Path>) -> Result<Self, LogError> {
        let general_path = general_path.as_ref().to_path_buf();
        let alert_path = alert_path.as_ref().to_path_buf();

        let general = open_append(&general_path)?;
        let alert = open_append(&alert_path)?;

        println!("General logs will be written to {}", general_path.display());
        println!("Alert logs will be written to {}", alert_path.display());

        let (sender, receiver) = unbounded();
        let writer = thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || writer_loop(receiver, LineWriter::new(general), LineWriter::new(alert)))
            .map_err(|source| LogError::Open {
                path: general_path.display().to_string(),
                source,
            })?;

        Ok(Self {
            inner: Arc::new(SinksInner {
                sender,
                writer: Mutex::new(Some(writer)),
                general_path,
                alert_path,
            }),
        })
    }

    pub fn general_path(&self) -> &Path {
        &self.inner.general_path
    }

    pub fn alert_path(&self) -> &Path {
        &self.inner.alert_path
    }

    /// Append one line to `sink`. General lines are also echoed to the console.
    pub fn write_line(&self, sink: Sink, text: &str) {
        if sink == Sink::General {
            log::info!("{}", text);
        }
        let command = SinkCommand::Line {
            sink,
            text: text.to_string(),
        };
        if self.inner.sender.send(command).is_err() {
            log::warn!("Log writer stopped, dropping line: {}", text);
        }
    }

    pub fn info(&self, text: &str) {
        self.write_line(Sink::General, text);
    }

    /// Record an alert in both the alert and the general sink.
    pub fn alert(&self, text: &str) {
        self.write_line(Sink::Alert, text);
        self.write_line(Sink::General, text);
    }

    /// Block until every line submitted so far is on disk.
    pub fn flush(&self) {
        let (ack, done) = bounded(1);
        if self.inner.sender.send(SinkCommand::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Stop the writer thread after draining pending lines.
    pub fn close(&self) {
        self.inner.shutdown();
    }
}

fn open_append(path: &Path) -> Result<File, LogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LogError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::Open {
            path: path.display().to_string(),
            source,
        })
}

fn writer_loop(receiver: Receiver<SinkCommand>, mut general: LineWriter<File>, mut alert: LineWriter<File>) {
    while let Ok(command) = receiver.recv() {
        match command {
            SinkCommand::Line { sink, text } => {
                let stamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
                let target = match sink {
                    Sink::General => &mut general,
                    Sink::Alert => &mut alert,
                };
                if let Err(e) = writeln!(target, "{} {}", stamp, text) {
                    eprintln!("Failed to write {:?} log line: {}", sink, e);
                }
            }
            SinkCommand::Flush(ack) => {
                let _ = general.flush();
                let _ = alert.flush();
                let _ = ack.send(());
            }
            SinkCommand::Stop => break,
        }
    }

    let _ = general.flush();
    let _ = alert.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_in(dir: &Path) -> LogSinks {
        LogSinks::setup(dir.join("logs/ecg.log"), dir.join("logs/alerts.log")).expect("setup sinks")
    }

    #[test]
    fn test_setup_creates_directories_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = setup_in(dir.path());

        assert!(sinks.general_path().exists());
        assert!(sinks.alert_path().exists());
        sinks.close();
    }

    #[test]
    fn test_alert_goes_to_both_sinks_info_to_general_only() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = setup_in(dir.path());

        sinks.info("Normal - HR=72, RR=0.83");
        sinks.alert("ALERT: TACHYCARDIA detected - High heart rate (HR=110 BPM, RR=0.55 s)");
        sinks.flush();

        let general = fs::read_to_string(sinks.general_path()).unwrap();
        let alerts = fs::read_to_string(sinks.alert_path()).unwrap();

        assert_eq!(general.lines().count(), 2);
        assert!(general.contains("Normal - HR=72"));
        assert!(general.contains("ALERT: TACHYCARDIA"));
        assert_eq!(alerts.lines().count(), 1);
        assert!(alerts.contains("ALERT: TACHYCARDIA"));
        assert!(!alerts.contains("Normal"));
    }

    #[test]
    fn test_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let first = setup_in(dir.path());
        first.info("first run");
        first.close();

        let second = setup_in(dir.path());
        second.info("second run");
        second.close();

        let general = fs::read_to_string(dir.path().join("logs/ecg.log")).unwrap();
        assert!(general.contains("first run"));
        assert!(general.contains("second run"));
    }

    #[test]
    fn test_concurrent_writers_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = setup_in(dir.path());

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let sinks = sinks.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        sinks.write_line(Sink::Alert, &format!("worker={} line={} end", worker, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        sinks.flush();

        let alerts = fs::read_to_string(sinks.alert_path()).unwrap();
        assert_eq!(alerts.lines().count(), 200);
        assert!(alerts.lines().all(|line| line.ends_with(" end")));
    }

    #[test]
    fn test_write_after_close_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = setup_in(dir.path());
        sinks.close();

        sinks.info("too late");
        sinks.flush();

        let general = fs::read_to_string(sinks.general_path()).unwrap();
        assert!(!general.contains("too late"));
    }

    #[test]
    fn test_setup_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let result = LogSinks::setup(blocker.join("ecg.log"), dir.path().join("alerts.log"));
        assert!(matches!(result, Err(LogError::CreateDir { .. })));
    }
}

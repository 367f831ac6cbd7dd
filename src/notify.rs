//! # Notification Module
//!
//! Severity-gated alert output on the client.
//!
//! ## Key Components
//! - `Notifier`: Anything that reacts to a classified `Condition`
//! - `TextNotifier`: One human-readable line per condition
//! - `AudioNotifier`: Plays a tone for abnormal conditions at or above a threshold
//! - `CompositeNotifier`: Fans a condition out to every registered notifier
//!
//! ## Audio Gating
//! | configured minimum | warning | critical |
//! |--------------------|---------|----------|
//! | normal             | yes     | yes      |
//! | warning            | yes     | yes      |
//! | critical           | no      | yes      |
//! | anything else      | no      | no       |
//!
//! Normal conditions never sound.

use std::io::{self, IsTerminal, Write};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use crate::display::paint;
use crate::error::NotifyError;
use crate::reading::{format_alert, Condition, Severity};

const WARNING_TONE_HZ: u32 = 800;
const CRITICAL_TONE_HZ: u32 = 1200;
const TONE_DURATION: Duration = Duration::from_millis(300);

pub trait Notifier: Send {
    fn notify(&mut self, condition: &Condition) -> Result<(), NotifyError>;
}

/// Writes one line per condition: a neutral message for normal readings,
/// `ALERT: <TYPE> - <description> at <timestamp>` otherwise.
pub struct TextNotifier {
    out: Box<dyn Write + Send>,
    use_color: bool,
    suppress_output: bool,
}

impl TextNotifier {
    pub fn stdout(use_color: bool) -> Self {
        Self::new(Box::new(io::stdout()), use_color)
    }

    pub fn new(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            suppress_output: false,
        }
    }

    pub fn suppressed(mut self, suppress: bool) -> Self {
        self.suppress_output = suppress;
        self
    }

    pub fn render(condition: &Condition) -> String {
        if condition.is_abnormal() {
            format_alert(condition)
        } else {
            "Normal heart activity detected".to_string()
        }
    }
}

impl Notifier for TextNotifier {
    fn notify(&mut self, condition: &Condition) -> Result<(), NotifyError> {
        if self.suppress_output {
            return Ok(());
        }
        let line = paint(&Self::render(condition), condition, self.use_color);
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Blocking tone playback.
pub trait ToneOutput: Send {
    /// Sound `frequency_hz` for `duration`, returning once playback is over.
    fn play(&mut self, frequency_hz: u32, duration: Duration) -> io::Result<()>;
}

/// Rings the terminal bell and holds for the tone duration.
///
/// The bell has a fixed pitch, so the requested frequency is not audible here.
pub struct TerminalBell {
    out: io::Stdout,
}

impl TerminalBell {
    /// Fails when stdout is not attached to a terminal.
    pub fn init() -> io::Result<Self> {
        let out = io::stdout();
        if !out.is_terminal() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stdout is not a terminal",
            ));
        }
        Ok(Self { out })
    }
}

impl ToneOutput for TerminalBell {
    fn play(&mut self, _frequency_hz: u32, duration: Duration) -> io::Result<()> {
        let mut out = self.out.lock();
        out.write_all(b"\x07")?;
        out.flush()?;
        drop(out);
        thread::sleep(duration);
        Ok(())
    }
}

pub struct AudioNotifier {
    /// `None` when the configured minimum was not a recognised severity
    min_severity: Option<Severity>,
    output: Option<Box<dyn ToneOutput>>,
    fallback: Box<dyn Write + Send>,
}

impl AudioNotifier {
    /// Notifier backed by the terminal bell, falling back to text when the
    /// bell is unavailable.
    pub fn from_setting(min_severity: &str) -> Self {
        let min = match min_severity.parse::<Severity>() {
            Ok(severity) => Some(severity),
            Err(e) => {
                log::warn!("{}; audio alerts disabled", e);
                None
            }
        };

        let output: Option<Box<dyn ToneOutput>> = match TerminalBell::init() {
            Ok(bell) => Some(Box::new(bell)),
            Err(e) => {
                println!("Warning: Audio initialization failed: {}", e);
                None
            }
        };

        Self::new(min, output)
    }

    pub fn new(min_severity: Option<Severity>, output: Option<Box<dyn ToneOutput>>) -> Self {
        Self {
            min_severity,
            output,
            fallback: Box::new(io::stdout()),
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn Write + Send>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn should_beep(&self, condition: &Condition) -> bool {
        if !condition.is_abnormal() {
            return false;
        }
        match self.min_severity {
            Some(min) => condition.severity >= min,
            None => false,
        }
    }

    pub fn tone_for(severity: Severity) -> (u32, Duration) {
        match severity {
            Severity::Critical => (CRITICAL_TONE_HZ, TONE_DURATION),
            _ => (WARNING_TONE_HZ, TONE_DURATION),
        }
    }

    fn text_fallback(&mut self, condition: &Condition) {
        if let Err(e) = writeln!(self.fallback, "BEEP ALERT: {} (no audio)", condition.kind) {
            log::warn!("Audio fallback output failed: {}", e);
        }
    }
}

impl Notifier for AudioNotifier {
    /// Never fails: playback problems degrade to the text fallback.
    fn notify(&mut self, condition: &Condition) -> Result<(), NotifyError> {
        if !self.should_beep(condition) {
            return Ok(());
        }

        let (frequency, duration) = Self::tone_for(condition.severity);
        let played = match self.output.as_mut() {
            Some(output) => match output.play(frequency, duration) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Tone playback failed: {}", e);
                    false
                }
            },
            None => false,
        };

        if !played {
            self.text_fallback(condition);
        }
        Ok(())
    }
}

/// Calls every registered notifier, in registration order, for each condition.
///
/// An error or panic in one notifier is logged and does not stop the rest.
#[derive(Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.push(Box::new(notifier));
        self
    }

    pub fn push(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Notifier for CompositeNotifier {
    fn notify(&mut self, condition: &Condition) -> Result<(), NotifyError> {
        for (position, notifier) in self.notifiers.iter_mut().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| notifier.notify(condition)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Notifier #{} failed: {}", position, e),
                Err(_) => log::error!("Notifier #{} panicked", position),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{classify, Reading};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingTone(Arc<Mutex<Vec<u32>>>);

    impl ToneOutput for RecordingTone {
        fn play(&mut self, frequency_hz: u32, _duration: Duration) -> io::Result<()> {
            self.0.lock().unwrap().push(frequency_hz);
            Ok(())
        }
    }

    struct BrokenTone;

    impl ToneOutput for BrokenTone {
        fn play(&mut self, _frequency_hz: u32, _duration: Duration) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "device unplugged"))
        }
    }

    fn warning() -> Condition {
        classify(&Reading::new(110, 0.55))
    }

    fn critical() -> Condition {
        classify(&Reading::new(130, 0.45))
    }

    fn normal() -> Condition {
        classify(&Reading::new(72, 0.83))
    }

    #[test]
    fn test_gating_table() {
        let cases = [
            ("normal", true, true),
            ("warning", true, true),
            ("critical", false, true),
            ("loud", false, false),
            ("", false, false),
        ];
        for (setting, on_warning, on_critical) in cases {
            let min = setting.parse::<Severity>().ok();
            let notifier = AudioNotifier::new(min, None);
            assert_eq!(notifier.should_beep(&warning()), on_warning, "min={}", setting);
            assert_eq!(notifier.should_beep(&critical()), on_critical, "min={}", setting);
            assert!(!notifier.should_beep(&normal()), "min={}", setting);
        }
    }

    #[test]
    fn test_tone_frequency_by_severity() {
        let tones = RecordingTone::default();
        let mut notifier = AudioNotifier::new(Some(Severity::Normal), Some(Box::new(tones.clone())));

        notifier.notify(&warning()).unwrap();
        notifier.notify(&critical()).unwrap();
        notifier.notify(&normal()).unwrap();

        let played = tones.0.lock().unwrap().clone();
        assert_eq!(played, vec![WARNING_TONE_HZ, CRITICAL_TONE_HZ]);
        assert!(CRITICAL_TONE_HZ > WARNING_TONE_HZ);
    }

    #[test]
    fn test_audio_fallback_without_device() {
        let buf = SharedBuf::default();
        let mut notifier =
            AudioNotifier::new(Some(Severity::Warning), None).with_fallback(Box::new(buf.clone()));

        assert!(notifier.notify(&critical()).is_ok());
        assert_eq!(buf.contents(), "BEEP ALERT: TACHYCARDIA (no audio)\n");
    }

    #[test]
    fn test_audio_playback_error_degrades_to_text() {
        let buf = SharedBuf::default();
        let mut notifier = AudioNotifier::new(Some(Severity::Warning), Some(Box::new(BrokenTone)))
            .with_fallback(Box::new(buf.clone()));

        assert!(notifier.notify(&warning()).is_ok());
        assert!(buf.contents().contains("BEEP ALERT: TACHYCARDIA"));
    }

    #[test]
    fn test_text_notifier_lines() {
        let buf = SharedBuf::default();
        let mut notifier = TextNotifier::new(Box::new(buf.clone()), false);

        notifier.notify(&normal()).unwrap();
        notifier.notify(&critical()).unwrap();

        let output = buf.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Normal heart activity detected");
        assert!(lines[1].starts_with("ALERT: TACHYCARDIA - High heart rate: 130 BPM at "));
    }

    #[test]
    fn test_text_notifier_suppressed() {
        let buf = SharedBuf::default();
        let mut notifier = TextNotifier::new(Box::new(buf.clone()), true).suppressed(true);
        notifier.notify(&critical()).unwrap();
        assert!(buf.contents().is_empty());
    }

    struct Probe {
        name: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
        behaviour: ProbeBehaviour,
    }

    enum ProbeBehaviour {
        Succeed,
        Fail,
        Panic,
    }

    impl Notifier for Probe {
        fn notify(&mut self, _condition: &Condition) -> Result<(), NotifyError> {
            self.calls.lock().unwrap().push(self.name);
            match self.behaviour {
                ProbeBehaviour::Succeed => Ok(()),
                ProbeBehaviour::Fail => Err(NotifyError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "closed",
                ))),
                ProbeBehaviour::Panic => panic!("probe exploded"),
            }
        }
    }

    #[test]
    fn test_composite_calls_all_in_order_despite_failures() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = |name, behaviour| Probe {
            name,
            calls: calls.clone(),
            behaviour,
        };

        let mut composite = CompositeNotifier::new()
            .with(probe("first", ProbeBehaviour::Fail))
            .with(probe("second", ProbeBehaviour::Panic))
            .with(probe("third", ProbeBehaviour::Succeed));
        assert_eq!(composite.len(), 3);

        composite.notify(&critical()).unwrap();
        composite.notify(&normal()).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec!["first", "second", "third", "first", "second", "third"]
        );
    }
}

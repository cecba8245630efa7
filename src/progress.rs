use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress from long-running operations. Passed in explicitly by
/// the caller; nothing here is global.
pub trait ProgressSink: Send + Sync {
    fn set_total(&self, total: u64);
    fn advance(&self, delta: u64);
    fn message(&self, msg: &str);
    fn finish(&self) {}
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_total(&self, _total: u64) {}
    fn advance(&self, _delta: u64) {}
    fn message(&self, _msg: &str) {}
}

/// Terminal progress bar for the CLI.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn advance(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn message(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call, for assertions in other modules' tests.
    #[derive(Default)]
    pub(crate) struct RecordingProgress {
        pub total: Mutex<u64>,
        pub done: Mutex<u64>,
        pub messages: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingProgress {
        fn set_total(&self, total: u64) {
            *self.total.lock().unwrap() = total;
        }

        fn advance(&self, delta: u64) {
            *self.done.lock().unwrap() += delta;
        }

        fn message(&self, msg: &str) {
            self.messages.lock().unwrap().push(msg.to_string());
        }
    }

    #[test]
    fn test_bar_progress_counts() {
        let progress = BarProgress::new();
        progress.set_total(4);
        progress.advance(3);
        assert_eq!(progress.bar.position(), 3);
        assert_eq!(progress.bar.length(), Some(4));
        progress.finish();
    }

    #[test]
    fn test_recording_progress() {
        let progress = RecordingProgress::default();
        progress.set_total(2);
        progress.advance(1);
        progress.advance(1);
        progress.message("done");
        assert_eq!(*progress.total.lock().unwrap(), 2);
        assert_eq!(*progress.done.lock().unwrap(), 2);
        assert_eq!(progress.messages.lock().unwrap().as_slice(), ["done".to_string()]);
    }
}

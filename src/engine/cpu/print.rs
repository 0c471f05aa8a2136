//! Bounded device-side print buffer.

use std::fmt::{self, Write as _};

use parking_lot::Mutex;

use crate::engine::PrintConfig;
use crate::util::UVec2;

#[derive(Default)]
struct State {
    text: String,
    dropped: usize,
}

/// Collects program output during a launch. Messages that would not fit in
/// the remaining capacity are dropped whole.
pub struct PrintBuffer {
    config: PrintConfig,
    state: Mutex<State>,
}

impl PrintBuffer {
    pub fn new(config: PrintConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> PrintConfig {
        self.config
    }

    /// Whether a program running at `index` may print.
    #[inline]
    pub fn accepts(&self, index: UVec2) -> bool {
        self.config.enabled && self.config.launch_index.map_or(true, |only| only == index)
    }

    pub fn print(&self, index: UVec2, args: fmt::Arguments<'_>) {
        if !self.accepts(index) {
            return;
        }
        let mut msg = String::new();
        // Formatting into a String cannot fail.
        let _ = msg.write_fmt(args);

        let mut state = self.state.lock();
        if state.text.len() + msg.len() > self.config.buffer_size {
            state.dropped += 1;
        } else {
            state.text.push_str(&msg);
        }
    }

    /// Take everything printed so far, plus the count of dropped messages.
    pub fn drain(&self) -> (String, usize) {
        let mut state = self.state.lock();
        let text = std::mem::take(&mut state.text);
        let dropped = std::mem::take(&mut state.dropped);
        (text, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_at_capacity() {
        let buf = PrintBuffer::new(PrintConfig {
            enabled: true,
            buffer_size: 16,
            launch_index: None,
        });
        buf.print(UVec2::ZERO, format_args!("0123456789\n"));
        buf.print(UVec2::ZERO, format_args!("abcdefghij\n"));
        buf.print(UVec2::ZERO, format_args!("xy\n"));

        let (text, dropped) = buf.drain();
        assert_eq!(text, "0123456789\nxy\n");
        assert_eq!(dropped, 1);
        assert_eq!(buf.drain(), (String::new(), 0));
    }

    #[test]
    fn test_launch_index_filter() {
        let buf = PrintBuffer::new(PrintConfig {
            enabled: true,
            buffer_size: 64,
            launch_index: Some(UVec2::new(5, 0)),
        });
        buf.print(UVec2::new(0, 0), format_args!("no\n"));
        buf.print(UVec2::new(5, 0), format_args!("yes\n"));
        assert_eq!(buf.drain().0, "yes\n");
    }

    #[test]
    fn test_disabled_prints_nothing() {
        let buf = PrintBuffer::new(PrintConfig {
            enabled: false,
            ..PrintConfig::default()
        });
        buf.print(UVec2::ZERO, format_args!("hidden\n"));
        assert!(buf.drain().0.is_empty());
    }
}

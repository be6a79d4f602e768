//! A tag-based logging facade on top of the [log] crate.
//!
//! Each crate declares an enum of [Tag]s. A tag decides whether it is enabled
//! at all and at which [log::Level] its messages are emitted; the sink is
//! whatever `log` implementation the embedder installs.

use log::Level;

/// The target prefix used for every message. A tag named `Call` logs to
/// `wasmjit::Call`, so `RUST_LOG=wasmjit=trace` enables everything.
pub const TARGET_PREFIX: &str = "wasmjit";

pub trait Logger {
    fn log(&self, tag: impl Tag, msg: impl FnOnce() -> String);
}

/// Usually a [Tag] is implemented for an enum containing the tags needed for a
/// particular crate. Tags that are not `enabled` are dropped before the
/// message closure runs.
pub trait Tag: core::fmt::Debug {
    fn enabled(&self) -> bool {
        true
    }

    fn level(&self) -> Level {
        Level::Debug
    }
}

/// Forwards to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn log(&self, tag: impl Tag, msg: impl FnOnce() -> String) {
        if !tag.enabled() {
            return;
        }
        let level = tag.level();
        if log::log_enabled!(target: TARGET_PREFIX, level) {
            let target = format!("{TARGET_PREFIX}::{tag:?}");
            log::log!(target: &target, level, "{}", msg());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestTag {
        On,
        Off,
    }

    impl Tag for TestTag {
        fn enabled(&self) -> bool {
            matches!(self, TestTag::On)
        }
    }

    #[test]
    fn disabled_tag_skips_message() {
        let mut called = false;
        LogLogger.log(TestTag::Off, || {
            called = true;
            String::new()
        });
        assert!(!called);
        LogLogger.log(TestTag::On, || "on".to_owned());
    }
}

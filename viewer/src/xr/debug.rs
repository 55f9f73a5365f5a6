//! Debug message routing for the runtime messenger and the GL debug output.

use tracing::{debug, error, info, warn};

/// Severity as reported by either callback source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
    Unknown,
}

impl Severity {
    /// Map `XrDebugUtilsMessageSeverityFlagsEXT` bits; the highest set
    /// bit wins.
    pub fn from_xr_bits(bits: u64) -> Self {
        if bits & 0x1000 != 0 {
            Severity::Error
        } else if bits & 0x0100 != 0 {
            Severity::Warning
        } else if bits & 0x0010 != 0 {
            Severity::Info
        } else if bits & 0x0001 != 0 {
            Severity::Verbose
        } else {
            Severity::Unknown
        }
    }

    /// Map `GL_DEBUG_SEVERITY_*`.
    pub fn from_gl(severity: u32) -> Self {
        match severity {
            0x9146 => Severity::Error,   // HIGH
            0x9147 => Severity::Warning, // MEDIUM
            0x9148 => Severity::Info,    // LOW
            0x826B => Severity::Verbose, // NOTIFICATION
            _ => Severity::Unknown,
        }
    }
}

/// Receiver for debug callbacks. Must outlive the registration, so the
/// runtime and GL wrappers hold it by `Arc`.
pub trait DebugSink: Send + Sync {
    fn on_message(&self, severity: Severity, category: &str, text: &str);
}

/// Re-emits messages through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDebugSink;

impl DebugSink for TracingDebugSink {
    fn on_message(&self, severity: Severity, category: &str, text: &str) {
        match severity {
            Severity::Verbose => debug!("{}: {}", category, text),
            Severity::Info => info!("{}: {}", category, text),
            Severity::Warning => warn!("{}: {}", category, text),
            Severity::Error | Severity::Unknown => error!("{}: {}", category, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Collect(Mutex<Vec<(Severity, String)>>);

    impl DebugSink for Collect {
        fn on_message(&self, severity: Severity, category: &str, text: &str) {
            self.0
                .lock()
                .unwrap()
                .push((severity, format!("{}: {}", category, text)));
        }
    }

    #[test]
    fn test_xr_severity_bits() {
        assert_eq!(Severity::from_xr_bits(0x0001), Severity::Verbose);
        assert_eq!(Severity::from_xr_bits(0x0010), Severity::Info);
        assert_eq!(Severity::from_xr_bits(0x0100), Severity::Warning);
        assert_eq!(Severity::from_xr_bits(0x1000), Severity::Error);
        assert_eq!(Severity::from_xr_bits(0x1001), Severity::Error);
        assert_eq!(Severity::from_xr_bits(0), Severity::Unknown);
    }

    #[test]
    fn test_gl_severity() {
        assert_eq!(Severity::from_gl(0x9146), Severity::Error);
        assert_eq!(Severity::from_gl(0x826B), Severity::Verbose);
        assert_eq!(Severity::from_gl(7), Severity::Unknown);
    }

    #[test]
    fn test_sink_trait_object() {
        let sink = Arc::new(Collect::default());
        let dyn_sink: Arc<dyn DebugSink> = sink.clone();
        dyn_sink.on_message(Severity::Warning, "xrCreateSession", "slow");
        TracingDebugSink.on_message(Severity::Unknown, "GL", "ignored");
        let got = sink.0.lock().unwrap();
        assert_eq!(got.as_slice(), &[(Severity::Warning, "xrCreateSession: slow".to_string())]);
    }
}

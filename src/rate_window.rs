use std::{collections::VecDeque, time::Duration};

/// Transfer rate over the most recent `span` of samples.
pub struct RateWindow {
    span: Duration,
    samples: VecDeque<(u64, Duration)>,
    bytes: u64,
    covered: Duration,
}

impl RateWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            samples: VecDeque::new(),
            bytes: 0,
            covered: Duration::ZERO,
        }
    }

    /// `bytes` arrived over `elapsed`.
    pub fn record(&mut self, bytes: u64, elapsed: Duration) {
        self.samples.push_back((bytes, elapsed));
        self.bytes += bytes;
        self.covered += elapsed;
        // The newest sample always stays, even when it alone exceeds the span.
        while self.covered > self.span && self.samples.len() > 1 {
            if let Some((bytes, elapsed)) = self.samples.pop_front() {
                self.bytes -= bytes;
                self.covered -= elapsed;
            }
        }
    }

    /// Bytes per second, 0 before any time has been recorded.
    pub fn rate(&self) -> f64 {
        if self.covered.is_zero() {
            return 0.0;
        }
        self.bytes as f64 / self.covered.as_secs_f64()
    }
}

use std::time::{Duration, Instant};
use testlens_core::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickIntent {
    /// Highlight the span, nothing else.
    Single(Span),
    /// Put the caret at the span start and hand focus back to the editor.
    Double(Span),
}

/// Tells a double click apart from two single clicks on a tree that only
/// reports single clicks. Nodes compare by span, not identity.
#[derive(Debug, Clone)]
pub struct ClickDisambiguator {
    last: Option<(Span, Instant)>,
    threshold: Duration,
}

impl ClickDisambiguator {
    pub fn new(threshold: Duration) -> Self {
        Self {
            last: None,
            threshold,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: Duration) {
        self.threshold = threshold;
    }

    pub fn on_click(&mut self, span: Span, now: Instant) -> ClickIntent {
        let double = match self.last {
            Some((last_span, last_at)) => {
                last_span == span && now.saturating_duration_since(last_at) < self.threshold
            }
            None => false,
        };
        self.last = Some((span, now));

        if double {
            ClickIntent::Double(span)
        } else {
            ClickIntent::Single(span)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testlens_core::Position;

    fn span(start: u32, end: u32) -> Span {
        Span::new(Position::new(0, start), Position::new(0, end))
    }

    fn ms(base: Instant, offset: u64) -> Instant {
        base + Duration::from_millis(offset)
    }

    #[test]
    fn second_click_on_same_span_within_threshold_is_double() {
        let mut clicks = ClickDisambiguator::new(Duration::from_millis(400));
        let t0 = Instant::now();
        let a = span(0, 10);

        assert_eq!(clicks.on_click(a, t0), ClickIntent::Single(a));
        assert_eq!(clicks.on_click(a, ms(t0, 300)), ClickIntent::Double(a));
    }

    #[test]
    fn clicks_on_different_spans_stay_single() {
        let mut clicks = ClickDisambiguator::new(Duration::from_millis(400));
        let t0 = Instant::now();
        let a = span(0, 10);
        let b = span(20, 30);

        assert_eq!(clicks.on_click(a, t0), ClickIntent::Single(a));
        assert_eq!(clicks.on_click(b, ms(t0, 300)), ClickIntent::Single(b));
    }

    #[test]
    fn slow_second_click_is_single_and_restarts_window() {
        let mut clicks = ClickDisambiguator::new(Duration::from_millis(400));
        let t0 = Instant::now();
        let a = span(0, 10);

        clicks.on_click(a, t0);
        assert_eq!(clicks.on_click(a, ms(t0, 400)), ClickIntent::Single(a));
        assert_eq!(clicks.on_click(a, ms(t0, 700)), ClickIntent::Double(a));
    }

    #[test]
    fn click_after_a_double_uses_the_double_as_reference() {
        let mut clicks = ClickDisambiguator::new(Duration::from_millis(400));
        let t0 = Instant::now();
        let a = span(0, 10);

        clicks.on_click(a, t0);
        clicks.on_click(a, ms(t0, 100));
        assert_eq!(clicks.on_click(a, ms(t0, 200)), ClickIntent::Double(a));
    }

    #[test]
    fn zero_threshold_never_doubles() {
        let mut clicks = ClickDisambiguator::new(Duration::ZERO);
        let t0 = Instant::now();
        let a = span(0, 10);

        clicks.on_click(a, t0);
        assert_eq!(clicks.on_click(a, t0), ClickIntent::Single(a));
    }
}

//! Stopping rule for scroll-to-bottom lazy loading.

/// How far to scroll a listing before taking its HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPolicy {
    /// Do not scroll (article pages).
    None,
    /// Scroll until the target count stops growing.
    Exhaustive,
    /// Like `Exhaustive`, but stop once this many targets are present.
    Bounded(usize),
}

impl ScrollPolicy {
    /// `0` means unbounded.
    pub fn from_max(max_articles: usize) -> Self {
        if max_articles == 0 {
            Self::Exhaustive
        } else {
            Self::Bounded(max_articles)
        }
    }

    pub fn ceiling(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Exhaustive => 100,
            Self::Bounded(_) => 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Disabled,
    TargetReached,
    /// Three scrolls in a row without new targets.
    Exhausted,
    Ceiling,
}

/// Consecutive non-increasing observations before giving up.
const STALE_LIMIT: u32 = 3;

/// Tracks target counts between scrolls and decides when to stop.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    policy: ScrollPolicy,
    best: usize,
    stale: u32,
    scrolls: u32,
}

impl ScrollTracker {
    pub fn new(policy: ScrollPolicy) -> Self {
        Self {
            policy,
            best: 0,
            stale: 0,
            scrolls: 0,
        }
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls
    }

    /// Count before the first scroll. Returns a reason when no scrolling is
    /// needed at all.
    pub fn start(&mut self, count: usize) -> Option<StopReason> {
        self.best = count;
        match self.policy {
            ScrollPolicy::None => Some(StopReason::Disabled),
            ScrollPolicy::Bounded(n) if count >= n => Some(StopReason::TargetReached),
            _ => None,
        }
    }

    /// Count after a scroll.
    pub fn observe(&mut self, count: usize) -> Option<StopReason> {
        self.scrolls += 1;
        if let ScrollPolicy::Bounded(n) = self.policy {
            if count >= n {
                return Some(StopReason::TargetReached);
            }
        }
        if count > self.best {
            self.best = count;
            self.stale = 0;
        } else {
            self.stale += 1;
            if self.stale >= STALE_LIMIT {
                return Some(StopReason::Exhausted);
            }
        }
        (self.scrolls >= self.policy.ceiling()).then_some(StopReason::Ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(policy: ScrollPolicy, initial: usize, counts: &[usize]) -> (Option<StopReason>, u32) {
        let mut tracker = ScrollTracker::new(policy);
        if let Some(reason) = tracker.start(initial) {
            return (Some(reason), 0);
        }
        for count in counts {
            if let Some(reason) = tracker.observe(*count) {
                return (Some(reason), tracker.scrolls());
            }
        }
        (None, tracker.scrolls())
    }

    #[test]
    fn test_stops_after_three_stale_scrolls() {
        let (reason, scrolls) = run(ScrollPolicy::Exhaustive, 10, &[20, 30, 30, 25, 30, 99]);
        assert_eq!(reason, Some(StopReason::Exhausted));
        assert_eq!(scrolls, 5);
    }

    #[test]
    fn test_growth_resets_staleness() {
        let (reason, _) = run(ScrollPolicy::Exhaustive, 10, &[10, 10, 11, 11, 11, 11]);
        assert_eq!(reason, Some(StopReason::Exhausted));
        let (reason, scrolls) = run(ScrollPolicy::Exhaustive, 10, &[10, 10, 11, 11]);
        assert_eq!(reason, None);
        assert_eq!(scrolls, 4);
    }

    #[test]
    fn test_bounded_target_and_ceiling() {
        assert_eq!(
            run(ScrollPolicy::Bounded(25), 10, &[20, 26]).0,
            Some(StopReason::TargetReached)
        );
        assert_eq!(
            run(ScrollPolicy::Bounded(5), 8, &[]).0,
            Some(StopReason::TargetReached)
        );

        let growing: Vec<usize> = (1..=200).collect();
        assert_eq!(
            run(ScrollPolicy::Bounded(1000), 0, &growing),
            (Some(StopReason::Ceiling), 50)
        );
        assert_eq!(
            run(ScrollPolicy::Exhaustive, 0, &growing),
            (Some(StopReason::Ceiling), 100)
        );
    }

    #[test]
    fn test_none_policy_never_scrolls() {
        assert_eq!(
            run(ScrollPolicy::None, 0, &[1, 2]),
            (Some(StopReason::Disabled), 0)
        );
        assert_eq!(ScrollPolicy::from_max(0), ScrollPolicy::Exhaustive);
        assert_eq!(ScrollPolicy::from_max(30), ScrollPolicy::Bounded(30));
    }
}

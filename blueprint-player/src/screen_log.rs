use std::collections::VecDeque;

/// Most recent `Print` output, each line fading out after its time-to-live.
#[derive(Debug, Clone)]
pub struct ScreenLog {
    lines: VecDeque<(String, f32)>,
    ttl: f32,
    max_lines: usize,
}

impl Default for ScreenLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL, Self::MAX_LINES)
    }
}

impl ScreenLog {
    pub const DEFAULT_TTL: f32 = 2.0;
    pub const MAX_LINES: usize = 6;

    pub fn new(ttl: f32, max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            ttl,
            max_lines,
        }
    }

    pub fn push(&mut self, text: String) {
        self.lines.push_back((text, self.ttl));
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    /// Ages every line by `dt` and drops the expired ones. Returns whether the
    /// visible text changed.
    pub fn update(&mut self, dt: f32) -> bool {
        for (_, ttl) in self.lines.iter_mut() {
            *ttl -= dt;
        }
        let before = self.lines.len();
        while self.lines.front().is_some_and(|(_, ttl)| *ttl <= 0.0) {
            self.lines.pop_front();
        }
        before != self.lines.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|(t, _)| t.as_str())
    }

    pub fn render(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_lines() {
        let mut log = ScreenLog::new(1.0, 2);
        log.push("a".to_string());
        log.push("b".to_string());
        log.push("c".to_string());
        assert_eq!(log.render(), "b\nc");
    }

    #[test]
    fn lines_expire_in_order() {
        let mut log = ScreenLog::new(1.0, 6);
        log.push("old".to_string());
        assert!(!log.update(0.5));
        log.push("new".to_string());

        assert!(log.update(0.6));
        assert_eq!(log.lines().collect::<Vec<_>>(), vec!["new"]);
        assert!(log.update(0.5));
        assert!(log.is_empty());
    }
}

//! Rotating advisory and tip text shown while a campaign is generated
//!
//! Cosmetic only; nothing here influences the poll state machine.

use rand::Rng;

pub const ADVISORY_MESSAGES: &[&str] = &[
    "Analyzing your brand profile",
    "Matching creators to your audience",
    "Drafting campaign briefs",
    "Estimating reach and engagement",
    "Putting the final touches on your campaign",
];

pub const TIPS: &[&str] = &[
    "Creators with smaller, engaged audiences often convert better than large accounts.",
    "Clear deliverables and deadlines make negotiations faster.",
    "Give creators room for their own voice; audiences notice scripted content.",
    "Track each creator with a unique link or code to measure results.",
    "Plan content a few weeks ahead of seasonal peaks.",
];

/// Cycles through a fixed list of lines
#[derive(Debug, Clone)]
pub struct Rotation {
    lines: &'static [&'static str],
    index: usize,
}

impl Rotation {
    pub fn new(lines: &'static [&'static str]) -> Self {
        Self { lines, index: 0 }
    }

    /// Start at a random line
    pub fn shuffled(lines: &'static [&'static str]) -> Self {
        let index = if lines.is_empty() {
            0
        } else {
            rand::rng().random_range(0..lines.len())
        };
        Self { lines, index }
    }

    pub fn current(&self) -> &'static str {
        self.lines.get(self.index).copied().unwrap_or("")
    }

    pub fn advance(&mut self) -> &'static str {
        if !self.lines.is_empty() {
            self.index = (self.index + 1) % self.lines.len();
        }
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_wraps() {
        let mut rotation = Rotation::new(&["a", "b"]);
        assert_eq!(rotation.current(), "a");
        assert_eq!(rotation.advance(), "b");
        assert_eq!(rotation.advance(), "a");
    }

    #[test]
    fn test_shuffled_starts_inside_list() {
        let rotation = Rotation::shuffled(TIPS);
        assert!(TIPS.contains(&rotation.current()));
    }

    #[test]
    fn test_empty_rotation_is_blank() {
        let mut rotation = Rotation::new(&[]);
        assert_eq!(rotation.advance(), "");
    }
}

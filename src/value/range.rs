use std::fmt;

/// A lazy, direction-aware integer sequence covering `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub end: i64,
}

impl Range {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.abs_diff(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The number `index` steps from `start`, walking toward `end`.
    /// `index == len` is allowed so slices can name their end.
    fn at(&self, index: usize) -> i64 {
        let step = index as i64;
        if self.end > self.start {
            self.start + step
        } else {
            self.start - step
        }
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        (index < self.len()).then(|| self.at(index))
    }

    pub fn slice(&self, start: usize, end: usize) -> Option<Range> {
        (start <= end && end <= self.len()).then(|| Range::new(self.at(start), self.at(end)))
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).map(|index| self.at(index))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_and_descending() {
        let up = Range::new(2, 5);
        assert_eq!(up.iter().collect::<Vec<_>>(), vec![2, 3, 4]);
        let down = Range::new(3, 0);
        assert_eq!(down.iter().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(down.get(3), None);
    }

    #[test]
    fn slicing_follows_direction() {
        assert_eq!(Range::new(10, 0).slice(2, 5), Some(Range::new(8, 5)));
        assert_eq!(Range::new(0, 3).slice(1, 4), None);
        assert_eq!(Range::new(0, 3).to_string(), "0 to 3");
    }
}

//! Motion-ceased detection from consecutive position samples.

/// Counts consecutive unchanged `(left, right)` samples.
#[derive(Debug, Clone, Copy)]
pub struct StandstillDetector {
    last: Option<(u32, u32)>,
    unchanged: u8,
    required: u8,
}

impl StandstillDetector {
    /// `required` unchanged samples signal standstill. The first sample
    /// after a reset only sets the reference.
    pub const fn new(required: u8) -> Self {
        Self {
            last: None,
            unchanged: 0,
            required,
        }
    }

    pub fn reset(&mut self, required: u8) {
        *self = Self::new(required);
    }

    /// Feed one sample; returns whether standstill is reached.
    pub fn sample(&mut self, left: u32, right: u32) -> bool {
        let current = (left, right);
        if self.last == Some(current) {
            self.unchanged = self.unchanged.saturating_add(1);
        } else {
            self.unchanged = 0;
        }
        self.last = Some(current);
        self.is_standstill()
    }

    #[inline]
    pub fn is_standstill(&self) -> bool {
        self.unchanged >= self.required
    }

    #[inline]
    pub fn unchanged(&self) -> u8 {
        self.unchanged
    }
}

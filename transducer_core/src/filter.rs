//! Per-channel moving average over raw ADC counts.

/// Fixed-depth circular-buffer moving average.
///
/// The buffer starts zero-filled, so the first `depth - 1` outputs ramp up
/// from zero. Output is `sum / depth` with truncating integer division.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    slots: Box<[i32]>,
    sum: i64,
    next: usize,
    average: i32,
}

impl MovingAverage {
    /// `depth` is clamped to at least 1.
    pub fn new(depth: usize) -> Self {
        Self {
            slots: vec![0; depth.max(1)].into_boxed_slice(),
            sum: 0,
            next: 0,
            average: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Push one raw sample and return the updated average.
    pub fn update(&mut self, raw: i32) -> i32 {
        self.sum -= i64::from(self.slots[self.next]);
        self.slots[self.next] = raw;
        self.sum += i64::from(raw);
        self.next = (self.next + 1) % self.slots.len();
        self.average = (self.sum / self.slots.len() as i64) as i32;
        self.average
    }

    /// Last value returned by `update` (0 before the first sample).
    pub fn average(&self) -> i32 {
        self.average
    }
}

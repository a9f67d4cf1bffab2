//! Slice descriptors and index resolution.

/// A slice descriptor built by `BuildSlice`.
///
/// Bounds are optional signed indices; resolution against a concrete
/// sequence length follows Python's clamping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

/// Error for a zero slice step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ZeroStep;

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// Resolves the slice against a sequence of `len` elements, returning
    /// the selected indices in iteration order.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>, ZeroStep> {
        let len = len as i64;
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(ZeroStep);
        }

        let clamp = |idx: i64, low: i64, high: i64| -> i64 {
            let idx = if idx < 0 { idx + len } else { idx };
            idx.clamp(low, high)
        };

        let mut out = Vec::new();
        if step > 0 {
            let start = clamp(self.start.unwrap_or(0), 0, len);
            let stop = clamp(self.stop.unwrap_or(len), 0, len);
            let mut i = start;
            while i < stop {
                out.push(i as usize);
                i += step;
            }
        } else {
            let start = clamp(self.start.unwrap_or(len - 1), -1, len - 1);
            let stop = clamp(self.stop.unwrap_or(-1 - len), -1, len - 1);
            let mut i = start;
            while i > stop {
                out.push(i as usize);
                i += step;
            }
        }
        Ok(out)
    }
}

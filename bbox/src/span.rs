use crate::common::*;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span<T> {
    start: T,
    end: T,
}

impl<T> Span<T>
where
    T: Copy + PartialOrd,
{
    pub fn try_new(start: T, end: T) -> Result<Self> {
        ensure!(start <= end, "span start must not exceed its end");
        Ok(Self { start, end })
    }

    pub fn start(&self) -> T {
        self.start
    }

    pub fn end(&self) -> T {
        self.end
    }

    pub fn contains(&self, value: T) -> bool {
        self.start <= value && value < self.end
    }
}

impl<T> Span<T>
where
    T: Copy + Num + PartialOrd,
{
    /// The `index`-th span of length `size` on a grid starting at zero.
    pub fn nth(index: T, size: T) -> Self {
        let start = index * size;
        Self {
            start,
            end: start + size,
        }
    }

    pub fn len(&self) -> T {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

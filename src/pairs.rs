///
/// Enumerates every unordered index pair `(i, j)` with `i < j < n`, outer index
/// ascending then inner index ascending. Cloning the iterator (or building a new
/// one with the same `n`) replays the identical sequence.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairIter {
    n: usize,
    i: usize,
    j: usize,
    remaining: usize,
}

impl PairIter {
    pub fn new(n: usize) -> Self {
        PairIter {
            n,
            i: 0,
            j: 1,
            remaining: pair_count(n),
        }
    }
}

impl Iterator for PairIter {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pair = (self.i, self.j);
        self.j += 1;
        if self.j == self.n {
            self.i += 1;
            self.j = self.i + 1;
        }
        self.remaining -= 1;
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PairIter {}

impl std::iter::FusedIterator for PairIter {}

/// `n * (n - 1) / 2`, zero for `n <= 1`.
pub fn pair_count(n: usize) -> usize {
    n.saturating_sub(1).saturating_mul(n) / 2
}

/// Collects items into batches of a fixed size.
#[derive(Debug)]
pub struct Batcher<T> {
    size: usize,
    pending: Vec<T>,
}

impl<T> Batcher<T> {
    /// A `size` of zero is treated as one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self { size, pending: Vec::with_capacity(size) }
    }

    /// Add an item; returns a full batch once `size` items are held.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.pending.push(item);
        if self.pending.len() >= self.size {
            Some(std::mem::replace(&mut self.pending, Vec::with_capacity(self.size)))
        } else {
            None
        }
    }

    /// The final partial batch, if anything is left.
    pub fn finish(&mut self) -> Option<Vec<T>> {
        if self.pending.is_empty() { None } else { Some(std::mem::take(&mut self.pending)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(n: usize, size: usize) -> Vec<usize> {
        let mut b = Batcher::new(size);
        let mut out: Vec<usize> = (0..n).filter_map(|i| b.push(i)).map(|v| v.len()).collect();
        out.extend(b.finish().map(|v| v.len()));
        out
    }

    #[test]
    fn splits_on_size_boundary() {
        assert_eq!(sizes(3, 3), vec![3]);
        assert_eq!(sizes(4, 3), vec![3, 1]);
        assert_eq!(sizes(7, 2), vec![2, 2, 2, 1]);
        assert!(sizes(0, 5).is_empty());
    }

    #[test]
    fn zero_size_means_one() {
        assert_eq!(sizes(2, 0), vec![1, 1]);
    }

    #[test]
    fn keeps_order() {
        let mut b = Batcher::new(2);
        assert_eq!(b.push('a'), None);
        assert_eq!(b.push('b'), Some(vec!['a', 'b']));
        assert_eq!(b.push('c'), None);
        assert_eq!(b.finish(), Some(vec!['c']));
        assert_eq!(b.finish(), None);
    }
}

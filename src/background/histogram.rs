//! Colour histogram primitives: bin mapping, mirror padding and a flat
//! 3-D count array.

/// Maps sample values to histogram bins.
///
/// Bin width is `ceil(256 / bins)`, so bin counts that do not divide 256
/// still produce indices in `[0, bins)`.
#[derive(Debug, Clone)]
pub struct BinMapper {
    bins: [usize; 3],
    inv_bin_width: [f64; 3],
}

impl BinMapper {
    /// Mapper for `bins` bins per channel. A count of 0 is treated as 1.
    pub fn new(bins: [u32; 3]) -> Self {
        let inv = |b: u32| 1.0 / (256.0 / f64::from(b.max(1))).ceil();
        Self {
            bins: bins.map(|b| b.max(1) as usize),
            inv_bin_width: [inv(bins[0]), inv(bins[1]), inv(bins[2])],
        }
    }

    /// Bin of `value` on `channel`.
    #[inline]
    pub fn bin(&self, channel: usize, value: f32) -> usize {
        let bin = (f64::from(value) * self.inv_bin_width[channel]) as usize;
        bin.min(self.bins[channel] - 1)
    }

    /// Flat histogram index of one 3-channel pixel.
    #[inline]
    pub fn index(&self, pixel: &[f32]) -> usize {
        let b0 = self.bin(0, pixel[0]);
        let b1 = self.bin(1, pixel[1]);
        let b2 = self.bin(2, pixel[2]);
        (b0 * self.bins[1] + b1) * self.bins[2] + b2
    }

    /// Total bins in one histogram.
    #[inline]
    pub fn len(&self) -> usize {
        self.bins.iter().product()
    }

    /// Never true for a constructed mapper.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reflects a coordinate into `[0, dim)` by mirroring at the edges.
///
/// `-1 -> 0`, `-k -> k-1`, `dim -> dim-1`, `dim+k-1 -> dim-k`. Valid for
/// coordinates within one `dim` of the range.
#[inline]
pub fn reflect(idx: isize, dim: usize) -> usize {
    let dim = dim as isize;
    let reflected = if idx < 0 {
        -idx - 1
    } else if idx >= dim {
        2 * dim - 1 - idx
    } else {
        idx
    };
    reflected as usize
}

/// Dense 3-D histogram stored as a flat array.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    counts: Vec<u32>,
}

impl Histogram {
    /// Empty histogram with `len` bins.
    pub fn new(len: usize) -> Self {
        Self {
            counts: vec![0; len],
        }
    }

    /// Counts one sample in `bin`.
    #[inline]
    pub fn add(&mut self, bin: usize) {
        self.counts[bin] += 1;
    }

    /// Takes back one sample from `bin`, which must hold at least one.
    #[inline]
    pub fn remove(&mut self, bin: usize) {
        self.counts[bin] -= 1;
    }

    /// Zeroes every bin.
    pub fn clear(&mut self) {
        self.counts.fill(0);
    }

    /// Raw bin counts.
    #[inline]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Sum of all bins.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }
}

/// Bhattacharyya-style overlap `sum(sqrt(a * b * normalizer))`.
///
/// With `normalizer = 1 / (|a| * |b|)` this is 1 for identical
/// distributions and 0 for disjoint ones.
pub fn similarity(a: &[u32], b: &[u32], normalizer: f64) -> f64 {
    a.iter()
        .zip(b)
        .filter(|&(&x, &y)| x != 0 && y != 0)
        .map(|(&x, &y)| (f64::from(x) * f64::from(y) * normalizer).sqrt())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_mapping_divisor() {
        let mapper = BinMapper::new([8, 8, 8]);
        assert_eq!(mapper.bin(0, 0.0), 0);
        assert_eq!(mapper.bin(0, 31.0), 0);
        assert_eq!(mapper.bin(0, 32.0), 1);
        assert_eq!(mapper.bin(0, 255.0), 7);
    }

    #[test]
    fn test_bin_mapping_uses_ceiling_width() {
        // ceil(256 / 3) = 86
        let mapper = BinMapper::new([3, 3, 3]);
        assert_eq!(mapper.bin(0, 85.0), 0);
        assert_eq!(mapper.bin(0, 86.0), 1);
        assert_eq!(mapper.bin(0, 172.0), 2);
        assert_eq!(mapper.bin(0, 255.0), 2);
    }

    #[test]
    fn test_flat_index() {
        let mapper = BinMapper::new([2, 4, 8]);
        assert_eq!(mapper.len(), 64);
        // bins (1, 2, 5) -> (1*4 + 2)*8 + 5
        assert_eq!(mapper.index(&[200.0, 130.0, 165.0]), 53);
    }

    #[test]
    fn test_reflect_edges() {
        for k in 1..=5isize {
            assert_eq!(reflect(-k, 10), (k - 1) as usize);
            assert_eq!(reflect(10 + k - 1, 10), (10 - k) as usize);
        }
        assert_eq!(reflect(0, 10), 0);
        assert_eq!(reflect(9, 10), 9);
    }

    #[test]
    fn test_histogram_add_remove() {
        let mut hist = Histogram::new(4);
        hist.add(1);
        hist.add(1);
        hist.add(3);
        hist.remove(1);
        assert_eq!(hist.counts(), &[0, 1, 0, 1]);
        assert_eq!(hist.total(), 2);
        hist.clear();
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn test_similarity_identical_and_disjoint() {
        let a = [9, 0, 0];
        let b = [18, 0, 0];
        assert!((similarity(&a, &b, 1.0 / (9.0 * 18.0)) - 1.0).abs() < 1e-12);
        assert_eq!(similarity(&a, &[0, 18, 0], 1.0 / (9.0 * 18.0)), 0.0);
    }
}

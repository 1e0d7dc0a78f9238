/// A detected peak with its prominence bases.
///
/// The bases mark where the peak's influence ends: the lowest sample on each side reached
/// before encountering a higher sample (or the edge of the data).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub position: usize,
    pub left_base: usize,
    pub right_base: usize,
    pub prominence: f64,
}

/// Find all local maxima of a series.
///
/// A sample is a maximum if it is strictly greater than its left neighbour and greater
/// than the next differing sample to its right. For flat tops the middle sample (rounded
/// down) is reported. The first and last samples are never maxima.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if x.len() < 3 {
        return maxima;
    }
    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                let left_edge = i;
                let right_edge = i_ahead - 1;
                maxima.push((left_edge + right_edge) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    maxima
}

/// Compute the prominence and bases of a single peak
fn prominence_of(x: &[f64], position: usize) -> Peak {
    let height = x[position];

    let mut left_min = height;
    let mut left_base = position;
    let mut i = position;
    loop {
        if x[i] > height {
            break;
        }
        if x[i] < left_min {
            left_min = x[i];
            left_base = i;
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    let mut right_base = position;
    for (j, value) in x.iter().enumerate().skip(position) {
        if *value > height {
            break;
        }
        if *value < right_min {
            right_min = *value;
            right_base = j;
        }
    }

    Peak {
        position,
        left_base,
        right_base,
        prominence: height - left_min.max(right_min),
    }
}

/// Find all peaks with a prominence of at least `min_prominence`, ordered by position
pub fn find_peaks(x: &[f64], min_prominence: f64) -> Vec<Peak> {
    local_maxima(x)
        .into_iter()
        .map(|position| prominence_of(x, position))
        .filter(|peak| peak.prominence >= min_prominence)
        .collect()
}

/// Merge neighbouring peaks which are really a single peak split by noise.
///
/// A peak is folded into the previously kept peak when both its left and right bases are
/// closer than `threshold` samples to the kept peak's bases. The merged peak averages the
/// position and both bases (rounded down) and keeps the earlier slot in the list.
pub fn merge_peaks(peaks: &[Peak], threshold: usize) -> Vec<Peak> {
    let mut merged: Vec<Peak> = Vec::with_capacity(peaks.len());
    for peak in peaks {
        if let Some(last) = merged.last_mut() {
            if last.left_base.abs_diff(peak.left_base) < threshold
                && last.right_base.abs_diff(peak.right_base) < threshold
            {
                log::debug!(
                    "Merging peaks at {} and {} (bases {}-{} and {}-{})",
                    last.position,
                    peak.position,
                    last.left_base,
                    last.right_base,
                    peak.left_base,
                    peak.right_base
                );
                *last = Peak {
                    position: (last.position + peak.position) / 2,
                    left_base: (last.left_base + peak.left_base) / 2,
                    right_base: (last.right_base + peak.right_base) / 2,
                    prominence: last.prominence.max(peak.prominence),
                };
                continue;
            }
        }
        merged.push(*peak);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_maxima_plateau() {
        let x = [0.0, 1.0, 3.0, 3.0, 3.0, 1.0, 0.0, 2.0, 0.0];
        assert_eq!(local_maxima(&x), vec![3, 7]);
        // Edges and plateaus running into the edge are not maxima
        assert!(local_maxima(&[5.0, 1.0, 2.0, 2.0]).is_empty());
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_prominence_bases() {
        //          0    1    2    3    4    5    6    7    8
        let x = [1.0, 0.0, 4.0, 2.0, 6.0, 1.0, 3.0, 0.5, 0.5];
        let peaks = find_peaks(&x, 0.0);
        assert_eq!(peaks.len(), 3);
        // Peak at 2 is bounded on the right by the taller peak at 4
        assert_eq!(peaks[0].position, 2);
        assert_eq!(peaks[0].left_base, 1);
        assert_eq!(peaks[0].right_base, 3);
        assert_eq!(peaks[0].prominence, 2.0);
        // Tallest peak spans the whole series; ties keep the base nearest the peak
        assert_eq!(peaks[1].position, 4);
        assert_eq!(peaks[1].left_base, 1);
        assert_eq!(peaks[1].right_base, 7);
        assert_eq!(peaks[1].prominence, 5.5);
        assert_eq!(peaks[2].position, 6);
        assert_eq!(peaks[2].left_base, 5);
        assert_eq!(peaks[2].right_base, 7);

        let tall_only = find_peaks(&x, 2.5);
        assert_eq!(tall_only.len(), 1);
        assert_eq!(tall_only[0].position, 4);
    }

    fn peak(position: usize, left_base: usize, right_base: usize) -> Peak {
        Peak {
            position,
            left_base,
            right_base,
            prominence: 1.0,
        }
    }

    #[test]
    fn test_merge_requires_both_bases_close() {
        let peaks = [peak(100, 90, 120), peak(104, 93, 123), peak(300, 280, 330)];
        let merged = merge_peaks(&peaks, 5);
        assert_eq!(merged, vec![peak(102, 91, 121), peak(300, 280, 330)]);

        // Right bases too far apart
        let peaks = [peak(100, 90, 120), peak(104, 93, 130)];
        assert_eq!(merge_peaks(&peaks, 5).len(), 2);

        // Distance equal to the threshold does not merge
        let peaks = [peak(100, 90, 120), peak(104, 95, 125)];
        assert_eq!(merge_peaks(&peaks, 5).len(), 2);
    }

    #[test]
    fn test_merge_keeps_input_untouched() {
        let peaks = vec![peak(10, 5, 20), peak(12, 6, 21)];
        let merged = merge_peaks(&peaks, 5);
        assert_eq!(merged.len(), 1);
        assert_eq!(peaks[0], peak(10, 5, 20));
    }
}

use ndarray::{s, Array1, Array2};
use std::path::{Path, PathBuf};

use super::constants::{FILE_DELIMITER, NOISE_REGION_ROWS};
use super::error::TraceError;

/// The amplitude table of one PM module file.
///
/// Files are colon-delimited, one row per trace bin. The first column is the bin index,
/// followed by two columns per channel. An optional non-numeric header line is skipped.
/// The bin column is dropped on load, so column 0 of the table is the first data column.
#[derive(Debug, Clone)]
pub struct TraceTable {
    path: PathBuf,
    data: Array2<f64>,
}

impl TraceTable {
    /// Read and parse a module file
    pub fn read(path: &Path) -> Result<Self, TraceError> {
        if !path.exists() {
            return Err(TraceError::BadFilePath(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        log::debug!(
            "Read {} from {}",
            human_bytes::human_bytes(contents.len() as f64),
            path.display()
        );
        Self::parse(&contents, path)
    }

    /// Parse the contents of a module file. The path is only used for error reporting.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, TraceError> {
        let mut lines = contents
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty())
            .peekable();

        let n_columns = match lines.peek() {
            Some((_, line)) => line.split(FILE_DELIMITER).count(),
            None => 0,
        };
        if n_columns < 3 || n_columns % 2 != 1 {
            return Err(TraceError::BadColumnCount {
                path: path.to_path_buf(),
                columns: n_columns,
            });
        }

        // Skip the header, if there is one
        if let Some((_, line)) = lines.peek() {
            if line
                .split(FILE_DELIMITER)
                .any(|field| field.trim().parse::<f64>().is_err())
            {
                lines.next();
            }
        }

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (line_number, line) in lines {
            let fields: Vec<&str> = line.split(FILE_DELIMITER).collect();
            if fields.len() != n_columns {
                return Err(TraceError::RaggedRow {
                    path: path.to_path_buf(),
                    line: line_number,
                    found: fields.len(),
                    expected: n_columns,
                });
            }
            let mut row = Vec::with_capacity(n_columns - 1);
            for field in fields.iter().skip(1) {
                let value = field.trim().parse::<f64>().map_err(|_| TraceError::BadValue {
                    path: path.to_path_buf(),
                    line: line_number,
                    value: field.to_string(),
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        if rows.len() <= NOISE_REGION_ROWS {
            return Err(TraceError::TooFewRows {
                path: path.to_path_buf(),
                rows: rows.len(),
            });
        }

        let data = Array2::from_shape_fn((rows.len(), n_columns - 1), |(r, c)| rows[r][c]);
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_channels(&self) -> usize {
        self.data.ncols() / 2
    }

    /// Elementwise sum of two data columns over the full trace
    pub fn pair_sum(&self, first: usize, second: usize) -> Array1<f64> {
        &self.data.column(first) + &self.data.column(second)
    }

    /// Elementwise sum of two data columns over the noise region (first 257 rows)
    pub fn noise_sum(&self, first: usize, second: usize) -> Array1<f64> {
        let region = self.data.slice(s![..NOISE_REGION_ROWS, ..]);
        &region.column(first) + &region.column(second)
    }

    /// Elementwise sum of two data columns over the signal region (rows after the noise region)
    pub fn signal_sum(&self, first: usize, second: usize) -> Array1<f64> {
        let region = self.data.slice(s![NOISE_REGION_ROWS.., ..]);
        &region.column(first) + &region.column(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_file(rows: usize, channels: usize, header: bool) -> String {
        let mut contents = String::new();
        if header {
            let mut head = vec![String::from("bin")];
            for c in 0..channels * 2 {
                head.push(format!("col{c}"));
            }
            contents.push_str(&head.join(":"));
            contents.push('\n');
        }
        for r in 0..rows {
            let mut fields = vec![r.to_string()];
            for c in 0..channels * 2 {
                fields.push(format!("{}", (r + c) as f64));
            }
            contents.push_str(&fields.join(":"));
            contents.push('\n');
        }
        contents
    }

    #[test]
    fn test_parse_with_header() {
        let table = TraceTable::parse(&make_file(300, 2, true), Path::new("pma0.txt")).unwrap();
        assert_eq!(table.n_rows(), 300);
        assert_eq!(table.n_channels(), 2);
        let signal = table.signal_sum(0, 1);
        let noise = table.noise_sum(0, 1);
        assert_eq!(signal.len(), 300 - NOISE_REGION_ROWS);
        assert_eq!(noise.len(), NOISE_REGION_ROWS);
        // row 257, columns 0 and 1 hold 257 and 258
        assert_eq!(signal[0], 515.0);
        assert_eq!(noise[0], 1.0);
    }

    #[test]
    fn test_parse_without_header() {
        let table = TraceTable::parse(&make_file(260, 1, false), Path::new("pma0.txt")).unwrap();
        assert_eq!(table.n_rows(), 260);
        assert_eq!(table.pair_sum(0, 1).len(), 260);
    }

    #[test]
    fn test_even_column_count_rejected() {
        // bin column plus three data columns
        let contents = "bin:a:b:c\n0:1:2:3\n";
        let err = TraceTable::parse(contents, Path::new("bad.txt")).unwrap_err();
        match err {
            TraceError::BadColumnCount { path, columns } => {
                assert_eq!(path, PathBuf::from("bad.txt"));
                assert_eq!(columns, 4);
            }
            e => panic!("Unexpected error {e}"),
        }
        assert!(TraceTable::parse("0\n1\n", Path::new("bad.txt")).is_err());
    }

    #[test]
    fn test_too_few_rows() {
        let err = TraceTable::parse(&make_file(257, 1, true), Path::new("short.txt")).unwrap_err();
        assert!(matches!(err, TraceError::TooFewRows { rows: 257, .. }));
    }

    #[test]
    fn test_ragged_row_and_bad_value() {
        let contents = "0:1:2\n1:1\n";
        assert!(matches!(
            TraceTable::parse(contents, Path::new("r.txt")),
            Err(TraceError::RaggedRow { line: 2, .. })
        ));
        let contents = "bin:a:b\n0:1:2\n1:x:2\n";
        assert!(matches!(
            TraceTable::parse(contents, Path::new("r.txt")),
            Err(TraceError::BadValue { line: 3, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TraceTable::read(Path::new("/no/such/file.txt")),
            Err(TraceError::BadFilePath(_))
        ));
    }
}

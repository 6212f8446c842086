//! Per-block samples and the tab-separated results file.

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, TimeZone};
use serde::Serialize;

/// Measurements taken when a block header arrived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlockSample {
    /// Block number.
    pub number: u64,
    /// Time since the previous header, or since the run start for the first one.
    pub delay: Duration,
    /// Pending transactions in the node's pool.
    pub pending: u64,
    /// Transactions included in the block.
    pub confirmed: u64,
    /// Confirmed transactions so far divided by seconds since the run start.
    pub cumulative_tps: f64,
}

impl BlockSample {
    fn render_line(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "{}\t{:.3}\t{}\t{}\t{:.2}",
            self.number,
            self.delay.as_secs_f64(),
            self.pending,
            self.confirmed,
            self.cumulative_tps,
        );
    }
}

/// Renders samples as tab-separated lines, ascending by block number.
pub fn render_samples(samples: &BTreeMap<u64, BlockSample>) -> String {
    let mut out = String::with_capacity(samples.len() * 32);
    for sample in samples.values() {
        sample.render_line(&mut out);
    }
    out
}

/// Location of the results file of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsFile {
    path: PathBuf,
}

impl ResultsFile {
    /// Builds `<dir>/<network>.<YYYYmmdd_HHMMSS>.<total>.<rate>.<mode>.txt`.
    pub fn new<Tz>(
        dir: impl AsRef<Path>,
        network: &str,
        started: &DateTime<Tz>,
        total: u64,
        rate: u64,
        mode: &str,
    ) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let stamp = started.format("%Y%m%d_%H%M%S");
        let name = format!("{network}.{stamp}.{total}.{rate}.{mode}.txt");
        Self { path: dir.as_ref().join(name) }
    }

    /// Uses `path` as is.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes all samples, creating the parent directory if needed.
    pub async fn write(&self, samples: &BTreeMap<u64, BlockSample>) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, render_samples(samples)).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample(number: u64, confirmed: u64) -> BlockSample {
        BlockSample {
            number,
            delay: Duration::from_millis(1500),
            pending: 7,
            confirmed,
            cumulative_tps: 3.333,
        }
    }

    #[test]
    fn test_render_is_ascending_and_tab_separated() {
        let mut samples = BTreeMap::new();
        samples.insert(12, sample(12, 4));
        samples.insert(10, sample(10, 2));
        samples.insert(11, sample(11, 0));

        let rendered = render_samples(&samples);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "10\t1.500\t7\t2\t3.33");
        let numbers: Vec<u64> =
            lines.iter().map(|line| line.split('\t').next().unwrap().parse().unwrap()).collect();
        assert_eq!(numbers, vec![10, 11, 12]);
    }

    #[test]
    fn test_file_name_embeds_run_parameters() {
        let started = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let file = ResultsFile::new("result", "eth", &started, 500, 50, "transfer_native");
        assert_eq!(file.path(), Path::new("result/eth.20240309_140507.500.50.transfer_native.txt"));
    }

    #[tokio::test]
    async fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = ResultsFile::at(dir.path().join("nested").join("run.txt"));

        let mut samples = BTreeMap::new();
        samples.insert(1, sample(1, 5));
        file.write(&samples).await.unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "1\t1.500\t7\t5\t3.33\n");
    }
}

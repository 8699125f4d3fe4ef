use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::io::Write;
use std::path::Path;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition for a node-exporter textfile collector. The file
    /// is swapped in atomically so a scrape never sees a partial write.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let body = self.render();
        crate::store::replace_file(path, |w| w.write_all(body.as_bytes()))
            .with_context(|| format!("writing metrics textfile {}", path.display()))
    }
}

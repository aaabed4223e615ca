//! Zip bundles for multi-file outputs.

use anyhow::Context;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writes `entries` (source path, name inside the archive) to `dest`.
///
/// Duplicate names get their position prepended so nothing is overwritten.
pub fn zip_files(entries: &[(PathBuf, String)], dest: &Path) -> anyhow::Result<()> {
    let file = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut seen = HashSet::new();
    for (index, (source, name)) in entries.iter().enumerate() {
        let name = if seen.insert(name.clone()) {
            name.clone()
        } else {
            format!("{}_{name}", index + 1)
        };

        zip.start_file(name.as_str(), options)
            .with_context(|| format!("adding {name} to archive"))?;
        let mut input =
            File::open(source).with_context(|| format!("opening {}", source.display()))?;
        std::io::copy(&mut input, &mut zip).with_context(|| format!("writing {name}"))?;
    }

    zip.finish().context("finalizing archive")?;
    Ok(())
}

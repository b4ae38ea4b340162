//! Network weights catalogue and on-disk materialization.
//!
//! Weights ship as packaged assets, either plain (`.pb`) or gzip-compressed
//! (`.pb.gz`). Before the engine starts they are copied into the data
//! directory once; later runs reuse the existing file. The copy is written
//! to a temporary file and renamed into place, so an interrupted copy never
//! leaves a partial weights file behind.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::NamedTempFile;

use crate::EngineError;

/// Maia weight sets, one per target playing strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaiaWeights {
    Elo1100,
    Elo1200,
    Elo1300,
    Elo1400,
    Elo1900,
}

impl MaiaWeights {
    pub const ALL: [MaiaWeights; 5] = [
        Self::Elo1100,
        Self::Elo1200,
        Self::Elo1300,
        Self::Elo1400,
        Self::Elo1900,
    ];

    pub fn elo(self) -> u16 {
        match self {
            Self::Elo1100 => 1100,
            Self::Elo1200 => 1200,
            Self::Elo1300 => 1300,
            Self::Elo1400 => 1400,
            Self::Elo1900 => 1900,
        }
    }

    /// Stable identifier, also used as the bot slug.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Elo1100 => "ELO_1100",
            Self::Elo1200 => "ELO_1200",
            Self::Elo1300 => "ELO_1300",
            Self::Elo1400 => "ELO_1400",
            Self::Elo1900 => "ELO_1900",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.slug() == slug)
    }

    /// Asset path relative to the packaged assets root.
    pub fn asset(self) -> String {
        format!("weights/maia-{}.pb", self.elo())
    }
}

/// Where to find packaged weights and where to put the usable copy.
#[derive(Debug, Clone)]
pub struct WeightsConfig {
    pub assets_dir: PathBuf,
    pub asset: String,
    pub output_dir: PathBuf,
}

impl WeightsConfig {
    pub fn for_weights(weights: MaiaWeights, assets_dir: &Path, data_dir: &Path) -> Self {
        Self {
            assets_dir: assets_dir.to_path_buf(),
            asset: weights.asset(),
            output_dir: data_dir.join("weights"),
        }
    }

    /// Final location of the weights file.
    pub fn target(&self) -> PathBuf {
        self.output_dir.join(weights_file_name(&self.asset))
    }
}

/// How `materialize_weights` satisfied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    AlreadyPresent,
    Copied,
    Decompressed,
}

/// Output file name: asset name without `.gz`, always ending in `.pb`.
pub fn weights_file_name(asset: &str) -> String {
    let name = asset.rsplit('/').next().unwrap_or(asset);
    let name = name.strip_suffix(".gz").unwrap_or(name);
    if name.ends_with(".pb") {
        name.to_string()
    } else {
        format!("{}.pb", name)
    }
}

/// Copy (or decompress) the weights asset into place unless a non-empty
/// copy already exists. Blocking; run it off the async executor.
pub fn materialize_weights(config: &WeightsConfig) -> Result<(PathBuf, Materialized), EngineError> {
    let target = config.target();
    tracing::debug!("Weights output file: {}", target.display());

    if let Ok(meta) = fs::metadata(&target) {
        if meta.len() > 0 {
            tracing::debug!("Weights already present. size={}", meta.len());
            return Ok((target, Materialized::AlreadyPresent));
        }
    }

    fs::create_dir_all(&config.output_dir)?;

    let plain = config.assets_dir.join(&config.asset);
    let gz = if config.asset.ends_with(".gz") {
        plain.clone()
    } else {
        config.assets_dir.join(format!("{}.gz", config.asset))
    };
    let plain_exists = !config.asset.ends_with(".gz") && plain.is_file();
    let gz_exists = gz.is_file();
    tracing::debug!(
        "Asset exists? pb={} gz={} (gzPath={})",
        plain_exists,
        gz_exists,
        gz.display()
    );

    let how = if plain_exists {
        write_into_place(File::open(&plain)?, &config.output_dir, &target)?;
        Materialized::Copied
    } else if gz_exists {
        let input = GzDecoder::new(File::open(&gz)?);
        if let Err(e) = write_into_place(input, &config.output_dir, &target) {
            tracing::error!("Failed decompressing weights: {}", e);
            return Err(e);
        }
        Materialized::Decompressed
    } else {
        return Err(EngineError::ConfigurationUnavailable(plain));
    };

    let size = fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
    tracing::info!("Weights materialized ({:?}), size={}", how, size);
    Ok((target, how))
}

/// Stream `input` into a temporary file in `dir`, then rename it to
/// `target`. The temporary file is removed if anything fails.
fn write_into_place(mut input: impl Read, dir: &Path, target: &Path) -> Result<(), EngineError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    io::copy(&mut input, &mut tmp)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| EngineError::Io(e.error))?;
    Ok(())
}

//! Source unit discovery

use crate::error::{ConvertError, ConvertResult};
use sp_core::{Config, SourceDialect};
use sp_sql::{split, SourceUnit};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A source file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Unit name (file stem)
    pub name: String,
    pub path: PathBuf,
}

/// Find every source file under `source_dir`, sorted by unit name.
///
/// Subdirectories are searched too. Unit names must be unique because
/// they name the output artifacts.
pub fn discover_files(config: &Config, source_dir: &Path) -> ConvertResult<Vec<SourceFile>> {
    if !source_dir.is_dir() {
        return Err(ConvertError::SourceDirNotFound {
            path: source_dir.display().to_string(),
        });
    }

    let mut found = Vec::new();
    walk(config, source_dir, &mut found)?;

    let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in found {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(first) = by_name.get(name) {
            return Err(ConvertError::DuplicateUnit {
                name: name.to_string(),
                first: first.display().to_string(),
                second: path.display().to_string(),
            });
        }
        by_name.insert(name.to_string(), path);
    }

    Ok(by_name
        .into_iter()
        .map(|(name, path)| SourceFile { name, path })
        .collect())
}

fn walk(config: &Config, dir: &Path, found: &mut Vec<PathBuf>) -> ConvertResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConvertError::ReadFailed {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            walk(config, &path, found)?;
        } else if config.is_source_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// Read and split one source file; `dialect` overrides the configured mapping
pub fn load_unit(
    config: &Config,
    file: &SourceFile,
    dialect: Option<SourceDialect>,
) -> ConvertResult<SourceUnit> {
    let sql = std::fs::read_to_string(&file.path).map_err(|e| ConvertError::ReadFailed {
        path: file.path.display().to_string(),
        source: e,
    })?;
    let dialect = dialect.unwrap_or_else(|| config.dialect_for(&file.path));
    log::debug!("{}: {} dialect", file.path.display(), dialect);
    Ok(split(&file.name, &sql, dialect))
}

/// Discover and load every source unit under `source_dir`
pub fn discover_units(
    config: &Config,
    source_dir: &Path,
    dialect: Option<SourceDialect>,
) -> ConvertResult<Vec<SourceUnit>> {
    discover_files(config, source_dir)?
        .iter()
        .map(|file| load_unit(config, file, dialect))
        .collect()
}

#[cfg(test)]
#[path = "discover_test.rs"]
mod tests;

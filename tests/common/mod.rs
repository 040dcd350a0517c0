#![allow(dead_code)]

pub mod mocks;

use std::{fs, io, path::Path};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Writes each `(relative path, content)` pair below `base`, creating the
/// folders on the way.
pub fn write_files(base: &Path, files: &[(&str, &[u8])]) -> io::Result<()> {
    for (relative, content) in files {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

/// Names of the entries of `dir`, sorted.
pub fn entry_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

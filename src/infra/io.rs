use std::{
    fs,
    io::Write,
    path::Path,
};

use anyhow::{Context, Result};

/// Read a UTF-8 file, stripping a leading byte-order mark.
pub fn read_text(path: &Path) -> Result<String>
{
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(match text.strip_prefix('\u{feff}')
    {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Replace `path` with `data` via a temp file in the same directory.
pub fn write_atomic(
    path: &Path,
    data: &[u8],
) -> Result<()>
{
    let dir = match path.parent()
    {
        Some(p) if !p
            .as_os_str()
            .is_empty() =>
        {
            fs::create_dir_all(p).with_context(|| format!("Failed to create {}", p.display()))?;
            p
        }
        _ => Path::new("."),
    };

    let tmp = match tempfile::NamedTempFile::new_in(dir)
    {
        Ok(t) => t,
        Err(_) => tempfile::NamedTempFile::new()?, // fall back to the OS temp dir
    };

    let mut file = tmp.as_file();
    file.write_all(data)?;
    file.sync_all()?;

    if let Err(e) = tmp.persist(path)
    {
        // Different filesystem; copy instead
        fs::copy(e.file.path(), path).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

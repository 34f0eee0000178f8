use rand::{distributions::Alphanumeric, Rng};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

pub fn ensure_dir_for_file(path: impl AsRef<Path>) -> io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn temp_sibling_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or("temp");
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    parent.join(format!("{}.{}.tmp", file_name, token))
}

/// Streams `reader` into a temp sibling of `path` and renames it into place.
/// An existing file at `path` is replaced. Returns the number of bytes written.
pub fn stage_from_reader<R: Read>(reader: &mut R, path: impl AsRef<Path>) -> io::Result<u64> {
    let path = path.as_ref();
    ensure_dir_for_file(path)?;
    let tmp = temp_sibling_path(path);
    let written = {
        let mut file = fs::File::create(&tmp)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        let written = io::copy(reader, &mut file)?;
        file.flush()?;
        file.sync_all()?;
        written
    };
    fs::rename(&tmp, path)?;
    Ok(written)
}

use crate::errors::BotError;
use crate::utils::fs_atomic::stage_from_reader;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

const SFTP_NO_SUCH_FILE: i32 = 2;

/// Copies the remote artifact into the local staging area. A missing remote
/// file is reported as `NotFound`; everything else as a transfer failure.
pub(super) fn fetch_artifact(
    sftp: &ssh2::Sftp,
    remote_path: &str,
    local_path: &Path,
) -> Result<u64, BotError> {
    match sftp.stat(Path::new(remote_path)) {
        Ok(stat) if stat.is_file() => {}
        Ok(_) => {
            return Err(BotError::transfer(format!(
                "Remote artifact is not a regular file: {}",
                remote_path
            )))
        }
        Err(err) => return Err(classify_stat_error(remote_path, &err)),
    }

    let mut remote_file = sftp.open(Path::new(remote_path)).map_err(|err| {
        BotError::transfer(format!(
            "Failed to open remote artifact {}: {}",
            remote_path, err
        ))
    })?;
    stage_from_reader(&mut remote_file, local_path).map_err(|err| {
        BotError::transfer(format!(
            "Failed to stage artifact at {}: {}",
            local_path.display(),
            err
        ))
    })
}

fn classify_stat_error(remote_path: &str, err: &ssh2::Error) -> BotError {
    if err.code() == ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE) {
        return BotError::not_found(format!("Remote artifact not found: {}", remote_path))
            .with_hint("The issuance program did not produce a file; the name may already be taken.");
    }
    BotError::transfer(format!(
        "Failed to stat remote artifact {}: {}",
        remote_path, err
    ))
}

pub fn sha256_file(path: &Path) -> Result<String, BotError> {
    let mut file = fs::File::open(path).map_err(|err| {
        BotError::transfer(format!("Staged artifact is unreadable: {}", err))
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

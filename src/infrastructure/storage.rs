//! 本地文件存储
//!
//! 保险库、会话和网络文件都是单写者的本地资源。写入一律走
//! 同目录临时文件 + fsync + rename，进程中断时不会留下半截文件。

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::error::{WalletError, WalletResult};

/// 创建数据目录（unix 下权限 0700）
///
/// 已存在的目录保持原有权限，只在过于宽松时告警
pub fn ensure_private_dir(dir: &Path) -> WalletResult<()> {
    if dir.is_dir() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir)
                .map_err(|e| WalletError::storage(dir, e))?
                .permissions()
                .mode();
            if mode & 0o077 != 0 {
                tracing::warn!(
                    dir = %dir.display(),
                    mode = format!("{:o}", mode & 0o777),
                    "Data directory is accessible by other users"
                );
            }
        }
        return Ok(());
    }

    fs::create_dir_all(dir).map_err(|e| WalletError::storage(dir, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|e| WalletError::storage(dir, e))?;
    }

    Ok(())
}

/// 原子写入，仅所有者可读写
///
/// `NamedTempFile` 在 unix 下以 0600 创建，rename 后权限保持不变
pub fn write_private_file(path: &Path, contents: &[u8]) -> WalletResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| WalletError::storage(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| WalletError::storage(parent, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| WalletError::storage(tmp.path(), e))?;

    tmp.persist(path)
        .map_err(|e| WalletError::storage(path, e.error))?;
    Ok(())
}

/// 序列化为 JSON 后原子写入
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> WalletResult<()> {
    let bytes = zeroize::Zeroizing::new(serde_json::to_vec_pretty(value)?);
    write_private_file(path, &bytes)
}

/// 读取 JSON 文件，不存在时返回 None
pub fn read_json<T: DeserializeOwned>(path: &Path) -> WalletResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => zeroize::Zeroizing::new(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(WalletError::storage(path, e)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// 读取文本文件，不存在时返回 None
pub fn read_text(path: &Path) -> WalletResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WalletError::storage(path, e)),
    }
}

/// 删除文件，不存在视为成功
pub fn remove_file_if_exists(path: &Path) -> WalletResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WalletError::storage(path, e)),
    }
}

//! 集群 ID 持久化
//!
//! 文件只有一行，内容为正整数形式的集群 ID。写入先落到临时文件并 sync，再原子改名。

use log::info;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::{ClientError, ClientResult};
use crate::core::types::ClusterID;

#[derive(Debug, Clone)]
pub struct ClusterIdFile {
    path: PathBuf,
}

impl ClusterIdFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取集群 ID，文件不存在时返回 `None`
    pub fn load(&self) -> ClientResult<Option<ClusterID>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let line = content.lines().next().unwrap_or("").trim();
        let cluster_id: ClusterID = line.parse().map_err(|_| {
            ClientError::Io(format!(
                "集群 ID 文件 {} 内容无效: {:?}",
                self.path.display(),
                line
            ))
        })?;
        if cluster_id <= 0 {
            return Err(ClientError::Io(format!(
                "集群 ID 文件 {} 中的 ID 必须为正数: {}",
                self.path.display(),
                cluster_id
            )));
        }
        Ok(Some(cluster_id))
    }

    pub fn persist(&self, cluster_id: ClusterID) -> ClientResult<()> {
        if cluster_id <= 0 {
            return Err(ClientError::InvalidInput(format!(
                "集群 ID 必须为正数: {}",
                cluster_id
            )));
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            writeln!(file, "{}", cluster_id)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        info!("集群 ID {} 已写入 {}", cluster_id, self.path.display());
        Ok(())
    }
}

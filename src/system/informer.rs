use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use systemstat::Platform;
use systemstat::System;

use crate::gossip::traits::PeerInformer;
use crate::models::peer::GeoPosition;

/// Reads load and disk figures from the operating system. Position and IP
/// are configured, not looked up.
#[derive(Debug, Clone)]
pub struct SystemInformer {
    ip: IpAddr,
    geo_position: GeoPosition,
    data_path: PathBuf,
}

impl SystemInformer {
    /// `data_path` is the mount point whose free space is reported.
    pub fn new(ip: IpAddr, geo_position: GeoPosition, data_path: PathBuf) -> Self {
        Self {
            ip,
            geo_position,
            data_path,
        }
    }
}

#[async_trait::async_trait]
impl PeerInformer for SystemInformer {
    async fn geo_position(&self) -> Result<GeoPosition> {
        Ok(self.geo_position)
    }

    /// Load averages over one, five and fifteen minutes, space separated.
    async fn cpu_load(&self) -> Result<String> {
        let load = System::new()
            .load_average()
            .context("reading load average")?;
        Ok(format!("{:.2} {:.2} {:.2}", load.one, load.five, load.fifteen))
    }

    /// Bytes available to unprivileged users on the data mount.
    async fn free_disk_space(&self) -> Result<f64> {
        let filesystem = System::new()
            .mount_at(&self.data_path)
            .with_context(|| format!("reading mount at {}", self.data_path.display()))?;
        Ok(filesystem.avail.as_u64() as f64)
    }

    async fn ip(&self) -> Result<IpAddr> {
        Ok(self.ip)
    }
}

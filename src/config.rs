use clap::ArgEnum;
use dirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use crate::*;

pub fn config_directory() -> Result<PathBuf> {
    let mut p = dirs::config_dir()
        .ok_or_else(|| anyhow!("unable to determine user config directory"))?;
    p.push("sbatch-run");
    Ok(p)
}

pub fn config_file() -> Result<PathBuf> {
    let mut p = config_directory()?;
    p.push("config.json");
    Ok(p)
}

/// Scheduler parameters used when the corresponding flag is not given.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultProfile {
    pub account: String,
    pub partition: String,
    pub time: String,
}

impl DefaultProfile {
    pub fn cpu() -> Self {
        DefaultProfile {
            account: "ACORG-SL2-CPU".to_string(),
            partition: "skylake".to_string(),
            time: "1:00:00".to_string(),
        }
    }

    pub fn gpu() -> Self {
        DefaultProfile {
            account: "DSMITH-SL2-GPU".to_string(),
            partition: "pascal".to_string(),
            time: "11:50:00".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub cpu: DefaultProfile,
    pub gpu: DefaultProfile,
    pub gpu_nodes: u32,
    pub gpu_gres: String,
    /// Install prefix of the beast2 package and its BEAGLE libraries.
    pub tools_root: PathBuf,
    pub sbatch: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            cpu: DefaultProfile::cpu(),
            gpu: DefaultProfile::gpu(),
            gpu_nodes: 1,
            gpu_gres: "gpu:4".to_string(),
            tools_root: PathBuf::from("/rds/project/djs200/rds-djs200-acorg/bt"),
            sbatch: "sbatch".to_string(),
        }
    }
}

impl Settings {
    pub fn profile(&self, gpu: bool) -> &DefaultProfile {
        if gpu {
            &self.gpu
        } else {
            &self.cpu
        }
    }

    pub fn beast2_binary(&self) -> PathBuf {
        self.tools_root.join("packages/beast2-gpu/beast/bin/beast")
    }

    pub fn library_dir(&self) -> PathBuf {
        self.tools_root.join("root/usr/local/lib")
    }

    /// Loads settings from `path`, or from the default config file when no
    /// path is given.  Only the default file is allowed to be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => read_json(p),
            None => {
                let p = config_file()?;
                if p.exists() {
                    log::info!("Reading settings from {}", p.display());
                    read_json(p)
                } else {
                    Ok(Default::default())
                }
            }
        }
    }
}

/// Versions of the generated script layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ArgEnum)]
pub enum Flavor {
    Current,
    Classic,
}

impl Default for Flavor {
    fn default() -> Self {
        Flavor::Current
    }
}

impl Flavor {
    pub fn name(&self) -> &'static str {
        match self {
            Flavor::Current => "current",
            Flavor::Classic => "classic",
        }
    }

    pub fn shebang(&self) -> &'static str {
        match self {
            Flavor::Current => "#!/bin/bash",
            Flavor::Classic => "#!/usr/bin/env bash",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Flavor::Current => ".sh",
            Flavor::Classic => ".sbatch",
        }
    }

    /// Strict mode and the BEAGLE library exports.
    pub fn has_preamble(&self) -> bool {
        *self == Flavor::Current
    }

    pub fn supports_gpu(&self) -> bool {
        *self == Flavor::Current
    }
}

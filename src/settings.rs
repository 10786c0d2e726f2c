// src/settings.rs

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};

use crate::query_router::tables::{RuleSet, RuleTables};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// TOML rule file; the built-in tables are used when absent.
    pub rules_path: Option<PathBuf>,
    /// Overrides the rule file's input length limit.
    pub max_query_length: Option<usize>,
}

impl EngineSettings {
    /// Builds rule tables from the configured file, or from the built-in
    /// tables.
    pub fn load_tables(&self) -> anyhow::Result<RuleTables> {
        let mut rules = match &self.rules_path {
            Some(path) => RuleSet::from_file(path)?,
            None => RuleSet::default(),
        };
        if let Some(limit) = self.max_query_length {
            rules.max_query_length = limit;
        }
        RuleTables::new(rules)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Settings {
    /// Load settings from the given TOML file, with sane defaults.
    pub fn from_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::<DefaultState>::default().set_default("web.address", DEFAULT_ADDR)?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder.build()?.try_deserialize()
    }
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

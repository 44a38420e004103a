use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

use crate::agent::BindDescriptor;

use super::types::{BindPlan, Config};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading configuration");

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(yaml).context("failed to parse YAML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.esmes.is_empty() {
            anyhow::bail!("no ESMEs defined in source yaml");
        }

        let mut esme_names = HashSet::new();
        for esme in &self.esmes {
            if !esme_names.insert(esme.name.as_str()) {
                anyhow::bail!("duplicate ESME name: {}", esme.name);
            }
            esme.ip.parse::<IpAddr>().with_context(|| {
                format!(
                    "invalid IP address [{}] in source yaml for ESME [{}]",
                    esme.ip, esme.name
                )
            })?;
        }

        let mut smsc_names = HashSet::new();
        for smsc in &self.smscs {
            if !smsc_names.insert(smsc.name.as_str()) {
                anyhow::bail!("duplicate SMSC name: {}", smsc.name);
            }
            smsc.ip.parse::<IpAddr>().with_context(|| {
                format!(
                    "invalid IP address [{}] in source yaml for SMSC [{}]",
                    smsc.ip, smsc.name
                )
            })?;
        }

        // Duplicate binds are tolerated; dangling references are not.
        for bind in &self.transceiver_binds {
            if !esme_names.contains(bind.esme.as_str()) {
                anyhow::bail!(
                    "invalid ESME name [{}] in TransceiverBind definition",
                    bind.esme
                );
            }
            if !smsc_names.contains(bind.smsc.as_str()) {
                anyhow::bail!(
                    "invalid SMSC name [{}] in TransceiverBind definition",
                    bind.smsc
                );
            }
        }

        Ok(())
    }

    /// Resolve the TransceiverBinds into per-ESME ordered bind descriptor
    /// lists. The password comes from the target SMSC's definition; the
    /// asserted identity from the ESME's.
    pub fn bind_plans(&self) -> Vec<BindPlan> {
        let smsc_by_name: HashMap<&str, _> = self
            .smscs
            .iter()
            .map(|smsc| (smsc.name.as_str(), smsc))
            .collect();

        self.esmes
            .iter()
            .map(|esme| {
                let binds = self
                    .transceiver_binds
                    .iter()
                    .filter(|bind| bind.esme == esme.name)
                    .filter_map(|bind| smsc_by_name.get(bind.smsc.as_str()))
                    .map(|smsc| BindDescriptor {
                        smsc_name: smsc.name.clone(),
                        remote_addr: smsc.listen_addr(),
                        system_id: esme.bind_system_id.clone(),
                        password: smsc.bind_password.clone(),
                        system_type: esme.bind_system_type.clone(),
                    })
                    .collect();

                BindPlan {
                    esme_name: esme.name.clone(),
                    binds,
                }
            })
            .collect()
    }
}

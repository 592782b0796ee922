pub mod model;


use std::path::Path;
use tokio::fs;

use crate::errors::Result;

pub use self::model::{
    ClassificationConfig, Config, FinalizeConfig, LoggingConfig, OutputConfig, OutputFormat,
    ProcessingConfig,
};

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or write the defaults there first when it does not exist yet.
    pub async fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if fs::try_exists(path).await? {
            return Ok((Self::load(path).await?, false));
        }

        let config = Config::default();
        let content = serde_json::to_string_pretty(&config)?;
        fs::write(path, content).await?;
        Ok((config, true))
    }
}

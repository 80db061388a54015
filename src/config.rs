use std::path::Path;

use burn::config::Config;

use crate::error::DataError;

/// Shapes and limits shared by the demonstration and paired decoders.
#[derive(Config, Debug)]
pub struct HabitatDataConfig {
    /// Side length of the square follower frames.
    #[config(default = 64)]
    pub img_size: usize,

    /// Width of the one-hot action vectors.
    #[config(default = 3)]
    pub action_dim: usize,

    /// Demonstrations are truncated to this many steps.
    #[config(default = 100)]
    pub demo_length: usize,

    /// Follower trajectories are padded or truncated to exactly this many steps.
    #[config(default = 100)]
    pub max_follow_length: usize,
}

impl HabitatDataConfig {
    pub fn validate(&self) -> crate::Result<()> {
        let fields = [
            ("img_size", self.img_size),
            ("action_dim", self.action_dim),
            ("demo_length", self.demo_length),
            ("max_follow_length", self.max_follow_length),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(DataError::Config {
                    reason: format!("{name} must be greater than zero"),
                });
            }
        }
        Ok(())
    }

    /// Loads a JSON config file and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let config = Self::load(path).map_err(|err| DataError::Config {
            reason: format!("{}: {err}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }
}

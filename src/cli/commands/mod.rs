//! Subcommand implementations.

pub mod eval;
pub mod health;
pub mod run;

use clap::Args;
use std::path::PathBuf;

use crate::domain::models::Config;

/// Flags shared by the commands that talk to the service and read the corpus.
#[derive(Args, Debug, Default, Clone)]
pub struct ServiceOverrides {
    /// Diagnosis service base URL
    #[arg(short, long)]
    pub server: Option<String>,

    /// Directory of test-case JSON files
    #[arg(short = 't', long)]
    pub test_dir: Option<PathBuf>,

    /// Concurrent evaluation requests
    #[arg(short, long)]
    pub parallelism: Option<usize>,
}

impl ServiceOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.server.url.clone_from(server);
        }
        if let Some(dir) = &self.test_dir {
            config.paths.test_dir.clone_from(dir);
        }
        if let Some(p) = self.parallelism {
            config.refine.parallelism = p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_given_flags_override() {
        let mut config = Config::default();
        let overrides = ServiceOverrides {
            server: Some("http://10.0.0.5:8080".into()),
            ..ServiceOverrides::default()
        };
        overrides.apply(&mut config);
        assert_eq!(config.server.url, "http://10.0.0.5:8080");
        assert_eq!(config.refine.parallelism, Config::default().refine.parallelism);
    }
}

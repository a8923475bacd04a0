//! Content-based hashing for run IDs.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Stable identifier for a run configuration and code version.
pub fn compute_run_id<T: Serialize>(config: &T, version: &str) -> String {
    let mut hasher = Sha256::new();

    let config_json = serde_json::to_string(config).unwrap_or_default();
    hasher.update(config_json.as_bytes());
    hasher.update(version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Config {
        name: &'static str,
        steps: u32,
    }

    #[test]
    fn hash_stability() {
        let config = Config {
            name: "rts",
            steps: 2,
        };
        assert_eq!(compute_run_id(&config, "v1"), compute_run_id(&config, "v1"));
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let a = Config {
            name: "rts",
            steps: 2,
        };
        let b = Config {
            name: "rts",
            steps: 3,
        };
        assert_ne!(compute_run_id(&a, "v1"), compute_run_id(&b, "v1"));
        assert_ne!(compute_run_id(&a, "v1"), compute_run_id(&a, "v2"));
    }
}

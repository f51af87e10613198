use std::path::PathBuf;

/// Where the simulated stages read and write their data files.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl DataConfig {
    pub fn from_env() -> Self {
        Self {
            input_dir: std::env::var("DATA_INPUT_DIR")
                .unwrap_or("data/input".to_string())
                .into(),
            output_dir: std::env::var("DATA_OUTPUT_DIR")
                .unwrap_or("data/output".to_string())
                .into(),
        }
    }
}

use std::env;
use std::path::PathBuf;

pub const SCOM_DEBUGFS: &str = "/sys/kernel/debug/powerpc/scom";
pub const CPUINFO: &str = "/proc/cpuinfo";

pub const SCOM_PATH_VAR: &str = "GETSRAM_SCOM_PATH";
pub const CPUINFO_PATH_VAR: &str = "GETSRAM_CPUINFO_PATH";

/// Host paths the XSCOM backend talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub scom_root: PathBuf,
    pub cpuinfo: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scom_root: PathBuf::from(SCOM_DEBUGFS),
            cpuinfo: PathBuf::from(CPUINFO),
        }
    }
}

impl Config {
    pub fn from_env() -> Config {
        let mut config = Config::default();

        if let Some(path) = env::var_os(SCOM_PATH_VAR) {
            config.scom_root = PathBuf::from(path);
        }
        if let Some(path) = env::var_os(CPUINFO_PATH_VAR) {
            config.cpuinfo = PathBuf::from(path);
        }

        config
    }
}

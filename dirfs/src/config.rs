//! Environment configuration shared by the command line front ends.

use std::path::PathBuf;

use crate::layout::MAX_PATH_LENGTH;

/// Working directory variable.
pub const CWD_VAR: &str = "ZPWD";
/// Virtual disk image variable.
pub const DISK_VAR: &str = "ZDISK";

pub const DEFAULT_CWD: &str = "/";
pub const DEFAULT_DISK: &str = "vdisk1";

#[derive(Debug, PartialEq, Clone)]
pub struct Environment {
    /// Working directory inside the file system that relative paths start from.
    pub cwd: String,
    /// Host path of the virtual disk image.
    pub disk_name: PathBuf,
}

impl Environment {
    /// Reads `ZPWD` and `ZDISK` from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the environment from an arbitrary variable lookup. Unset variables
    /// take their defaults and values are cut to fit a path buffer.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cwd = lookup(CWD_VAR).unwrap_or_else(|| DEFAULT_CWD.to_string());
        let disk_name = lookup(DISK_VAR).unwrap_or_else(|| DEFAULT_DISK.to_string());
        Self {
            cwd: truncate(cwd),
            disk_name: PathBuf::from(truncate(disk_name)),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

fn truncate(mut value: String) -> String {
    let mut end = value.len().min(MAX_PATH_LENGTH - 1);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.truncate(end);
    value
}

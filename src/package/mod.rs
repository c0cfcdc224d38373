use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::{DEFAULT_MEMORY_SIZE, MemoryBackendKind, RuntimeConfig};

/// Project manifest (masm.toml)
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub program: ProgramInfo,
    #[serde(default)]
    pub memory: MemorySettings,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgramInfo {
    pub name: String,
    #[serde(default = "default_entry")]
    pub entry: String,
    /// Include search root, relative to the manifest directory
    #[serde(default = "default_root")]
    pub root: String,
}

fn default_entry() -> String {
    "main.masm".to_string()
}

fn default_root() -> String {
    ".".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default = "default_file")]
    pub file: String,
}

fn default_backend() -> String {
    "array".to_string()
}

fn default_size() -> usize {
    DEFAULT_MEMORY_SIZE
}

fn default_file() -> String {
    "masm.mem".to_string()
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            size: default_size(),
            file: default_file(),
        }
    }
}

impl ProjectManifest {
    /// Create a new manifest with default values
    pub fn new(name: &str) -> Self {
        Self {
            program: ProgramInfo {
                name: name.to_string(),
                entry: default_entry(),
                root: default_root(),
            },
            memory: MemorySettings::default(),
        }
    }

    /// Load manifest from a directory
    pub fn load(dir: &Path) -> Result<Self, String> {
        let manifest_path = dir.join("masm.toml");
        let content = fs::read_to_string(&manifest_path)
            .map_err(|e| format!("failed to read masm.toml: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse masm.toml: {}", e))
    }

    /// Save manifest to a directory
    pub fn save(&self, dir: &Path) -> Result<(), String> {
        let manifest_path = dir.join("masm.toml");
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize masm.toml: {}", e))?;
        fs::write(&manifest_path, content)
            .map_err(|e| format!("failed to write masm.toml: {}", e))
    }

    /// Fold the manifest's memory settings into a runtime config.
    pub fn apply(&self, config: &mut RuntimeConfig) -> Result<(), String> {
        config.backend = match self.memory.backend.as_str() {
            "array" => MemoryBackendKind::Array,
            "mapped" => MemoryBackendKind::Mapped,
            other => return Err(format!("unknown memory backend: {}", other)),
        };
        config.memory_size = self.memory.size;
        config.memory_file = self.memory.file.clone().into();
        Ok(())
    }
}

/// Initialize a new masm project
pub fn init_project(dir: &Path, name: Option<&str>) -> Result<(), String> {
    let project_name = name
        .map(|s| s.to_string())
        .or_else(|| dir.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "myprogram".to_string());

    let manifest_path = dir.join("masm.toml");
    if manifest_path.exists() {
        return Err(format!("masm.toml already exists in {}", dir.display()));
    }

    let manifest = ProjectManifest::new(&project_name);
    manifest.save(dir)?;

    let main_masm = dir.join("main.masm");
    if !main_masm.exists() {
        let content = "; entry point\nlbl main\nDB $100 \"Hello, world!\\n\"\nOUT 1 $100\nHLT\n";
        fs::write(&main_masm, content).map_err(|e| format!("failed to write main.masm: {}", e))?;
    }

    println!(
        "Created new masm project '{}' in {}",
        project_name,
        dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manifest() {
        let manifest = ProjectManifest::new("demo");
        assert_eq!(manifest.program.name, "demo");
        assert_eq!(manifest.program.entry, "main.masm");
        assert_eq!(manifest.memory.backend, "array");
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ProjectManifest::new("demo");
        manifest.save(dir.path()).unwrap();

        let loaded = ProjectManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.program.name, "demo");
        assert_eq!(loaded.memory.size, DEFAULT_MEMORY_SIZE);
    }

    #[test]
    fn test_manifest_defaults_applied() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("masm.toml"),
            "[program]\nname = \"tiny\"\n",
        )
        .unwrap();
        let loaded = ProjectManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.program.entry, "main.masm");
        assert_eq!(loaded.memory.backend, "array");
    }

    #[test]
    fn test_apply_to_config() {
        let mut manifest = ProjectManifest::new("demo");
        manifest.memory.backend = "mapped".to_string();
        manifest.memory.file = "cells.mem".to_string();

        let mut config = RuntimeConfig::default();
        manifest.apply(&mut config).unwrap();
        assert_eq!(config.backend, MemoryBackendKind::Mapped);
        assert_eq!(config.memory_file.to_str().unwrap(), "cells.mem");

        manifest.memory.backend = "cloud".to_string();
        assert!(manifest.apply(&mut config).is_err());
    }

    #[test]
    fn test_init_project() {
        let dir = tempfile::tempdir().unwrap();
        init_project(dir.path(), Some("fresh")).unwrap();
        assert!(dir.path().join("masm.toml").exists());
        assert!(dir.path().join("main.masm").exists());

        let manifest = ProjectManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.program.name, "fresh");

        // re-init refuses to clobber
        assert!(init_project(dir.path(), Some("fresh")).is_err());
    }
}

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_true")]
    pub mic_enabled_on_join: bool,
    #[serde(default)]
    pub camera_enabled_on_join: bool,
    #[serde(default = "default_true")]
    pub mirror_self_view: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            display_name: None,
            mic_enabled_on_join: true,
            camera_enabled_on_join: false,
            mirror_self_view: true,
        }
    }
}

/// JSON-file-backed preference store under a host-provided data dir.
pub struct PreferencesStore {
    prefs: Mutex<Preferences>,
    file_path: PathBuf,
}

impl PreferencesStore {
    pub fn new(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("preferences.json");
        let prefs = Self::load(&file_path);
        Self {
            prefs: Mutex::new(prefs),
            file_path,
        }
    }

    pub fn get(&self) -> Preferences {
        self.prefs.lock().unwrap().clone()
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.prefs.lock().unwrap().display_name = name;
        self.save();
    }

    pub fn set_mic_enabled_on_join(&self, enabled: bool) {
        self.prefs.lock().unwrap().mic_enabled_on_join = enabled;
        self.save();
    }

    pub fn set_camera_enabled_on_join(&self, enabled: bool) {
        self.prefs.lock().unwrap().camera_enabled_on_join = enabled;
        self.save();
    }

    pub fn set_mirror_self_view(&self, mirror: bool) {
        self.prefs.lock().unwrap().mirror_self_view = mirror;
        self.save();
    }

    fn save(&self) {
        let prefs = self.prefs.lock().unwrap().clone();
        if let Some(parent) = self.file_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&prefs) {
            let _ = std::fs::write(&self.file_path, json);
        }
    }

    fn load(path: &PathBuf) -> Preferences {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Preferences::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn defaults_when_no_file() {
        let dir = temp_dir();
        let store = PreferencesStore::new(dir.path().to_str().unwrap());
        assert_eq!(store.get(), Preferences::default());
    }

    #[test]
    fn display_name_persists_across_stores() {
        let dir = temp_dir();
        let path = dir.path().to_str().unwrap();
        {
            let store = PreferencesStore::new(path);
            store.set_display_name(Some("Alice".to_string()));
        }
        let store = PreferencesStore::new(path);
        assert_eq!(store.get().display_name, Some("Alice".to_string()));
    }

    #[test]
    fn join_toggles_persist() {
        let dir = temp_dir();
        let path = dir.path().to_str().unwrap();
        {
            let store = PreferencesStore::new(path);
            store.set_mic_enabled_on_join(false);
            store.set_camera_enabled_on_join(true);
            store.set_mirror_self_view(false);
        }
        let store = PreferencesStore::new(path);
        let prefs = store.get();
        assert!(!prefs.mic_enabled_on_join);
        assert!(prefs.camera_enabled_on_join);
        assert!(!prefs.mirror_self_view);
    }

    #[test]
    fn clearing_display_name() {
        let dir = temp_dir();
        let store = PreferencesStore::new(dir.path().to_str().unwrap());
        store.set_display_name(Some("Bob".to_string()));
        store.set_display_name(None);
        assert_eq!(store.get().display_name, None);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = temp_dir();
        fs::write(dir.path().join("preferences.json"), "not json!!!").unwrap();
        let store = PreferencesStore::new(dir.path().to_str().unwrap());
        assert_eq!(store.get(), Preferences::default());
    }

    #[test]
    fn partial_json_uses_serde_defaults() {
        let dir = temp_dir();
        fs::write(
            dir.path().join("preferences.json"),
            r#"{"display_name":"Eve"}"#,
        )
        .unwrap();
        let store = PreferencesStore::new(dir.path().to_str().unwrap());
        let prefs = store.get();
        assert_eq!(prefs.display_name, Some("Eve".to_string()));
        assert!(prefs.mic_enabled_on_join);
        assert!(!prefs.camera_enabled_on_join);
        assert!(prefs.mirror_self_view);
    }
}

//! Level counter persisted as a single integer in a text file.

use std::fs;
use std::path::PathBuf;

use maze_lab_system_session::LevelStore;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub(crate) struct FileLevelStore {
    path: PathBuf,
}

impl FileLevelStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LevelStore for FileLevelStore {
    fn load(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.path).ok()?;
        match contents.trim().parse() {
            Ok(level) => Some(level),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "ignoring unreadable level file");
                None
            }
        }
    }

    fn store(&mut self, level: u32) {
        match fs::write(&self.path, format!("{level}\n")) {
            Ok(()) => debug!(path = %self.path.display(), level, "level saved"),
            Err(error) => warn!(path = %self.path.display(), %error, "failed to save level"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_has_no_level() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileLevelStore::new(temp.path().join("level"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn stored_level_survives_a_new_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("level");

        FileLevelStore::new(path.clone()).store(5);

        assert_eq!(fs::read_to_string(&path).expect("read"), "5\n");
        assert_eq!(FileLevelStore::new(path).load(), Some(5));
    }

    #[test]
    fn garbage_is_ignored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("level");
        fs::write(&path, "three").expect("write");

        assert_eq!(FileLevelStore::new(path).load(), None);
    }
}

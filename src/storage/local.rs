// Local filesystem storage

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::{Storage, StorageError, StorageResult};

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let rel = Path::new(path);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> StorageResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.walk(&path, out)?;
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
                out.push(parts.join("/"));
            }
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    fn save(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let full = self.resolve(path)?;
        if let Some(dir) = full.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(full, data)?;
        Ok(())
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        Ok(fs::read(self.resolve(path)?)?)
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.resolve(path)?.exists())
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        match fs::remove_file(self.resolve(path)?) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => Ok(other?),
        }
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let dir = self.resolve(prefix)?;
        let mut out = Vec::new();
        if dir.is_dir() {
            self.walk(&dir, &mut out)?;
        }
        out.sort();
        Ok(out)
    }

    fn size(&self, path: &str) -> StorageResult<u64> {
        Ok(fs::metadata(self.resolve(path)?)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::find_by_suffix;

    fn temp_store() -> (LocalStorage, PathBuf) {
        let root = std::env::temp_dir().join(format!("comtrade-store-{}", uuid::Uuid::new_v4()));
        (LocalStorage::new(&root).unwrap(), root)
    }

    #[test]
    fn test_save_list_read_delete() {
        let (store, root) = temp_store();
        store.save("ds1/REC.CFG", b"cfg").unwrap();
        store.save("ds1/rec.dat", b"dat!").unwrap();
        store.save("ds2/other.cfg", b"x").unwrap();

        assert_eq!(store.list("ds1").unwrap(), vec!["ds1/REC.CFG", "ds1/rec.dat"]);
        assert_eq!(store.list("").unwrap().len(), 3);
        assert!(store.list("missing").unwrap().is_empty());
        assert_eq!(store.size("ds1/rec.dat").unwrap(), 4);

        assert_eq!(find_by_suffix(&store, "ds1", ".cfg").unwrap(), "ds1/REC.CFG");
        assert!(matches!(
            find_by_suffix(&store, "ds2", ".dat"),
            Err(StorageError::NotFound { .. })
        ));

        store.delete("ds1/rec.dat").unwrap();
        store.delete("ds1/rec.dat").unwrap();
        assert!(!store.exists("ds1/rec.dat").unwrap());
        assert_eq!(store.read("ds1/REC.CFG").unwrap(), b"cfg");

        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_rejects_traversal() {
        let (store, root) = temp_store();
        assert!(matches!(
            store.read("../etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(store.save("/abs", b""), Err(StorageError::InvalidPath(_))));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_current_dir_does_not_resolve_to_root() {
        let (store, root) = temp_store();
        store.save("ds1/a.cfg", b"cfg").unwrap();
        store.save("ds2/b.dat", b"dat").unwrap();

        for prefix in [".", "./", "./ds1"] {
            assert!(matches!(store.list(prefix), Err(StorageError::InvalidPath(_))));
        }
        assert!(matches!(store.delete("./ds1/a.cfg"), Err(StorageError::InvalidPath(_))));
        assert_eq!(store.list("").unwrap(), vec!["ds1/a.cfg", "ds2/b.dat"]);

        fs::remove_dir_all(root).ok();
    }
}

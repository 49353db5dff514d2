use std::path::PathBuf;

use rand::distributions::{Alphanumeric, DistString};

const NAME_LEN: usize = 16;

/// A random path to dump a rejected manifest to, e.g. `/tmp/Xk3..q.json`.
pub fn manifest_dump_path() -> PathBuf {
    let mut name = String::with_capacity(NAME_LEN + ".json".len());
    Alphanumeric.append_string(&mut rand::thread_rng(), &mut name, NAME_LEN);
    name.push_str(".json");
    std::env::temp_dir().join(name)
}

/// Writes the manifest to a fresh path and returns that path.
pub fn dump_manifest(manifest: &[u8]) -> std::io::Result<PathBuf> {
    let path = manifest_dump_path();
    std::fs::write(&path, manifest)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_paths_are_random_json_files() {
        let a = manifest_dump_path();
        let b = manifest_dump_path();
        assert_ne!(a, b);
        assert_eq!(a.extension().and_then(|ext| ext.to_str()), Some("json"));
        assert_eq!(
            a.file_stem().map(|stem| stem.len()),
            Some(NAME_LEN),
        );
    }

    #[test]
    fn dump_manifest_writes_the_bytes() {
        let path = dump_manifest(b"{}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        std::fs::remove_file(path).unwrap();
    }
}

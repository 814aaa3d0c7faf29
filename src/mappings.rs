//! Operator-provided mapping files.
//!
//! `<config>/mappings/_default/` holds mappings applied to every new
//! index; `<config>/mappings/<index>/` holds index-scoped overrides. The
//! file basename (extension stripped) is the mapping type; the content is
//! read verbatim as UTF-8. Mapping files are hints, not sources of truth:
//! a file that cannot be read is skipped with a warning.

use crate::environment::Environment;
use log::warn;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const DEFAULT_MAPPINGS_DIR: &str = "_default";

/// Loads the layered mapping set for `index`: defaults first, then
/// index-scoped overrides. Within one directory the first file read for a
/// type wins; across layers the later layer overwrites the earlier one.
pub fn load_index_mappings(environment: &Environment, index: &str) -> BTreeMap<String, String> {
    let mut mappings = BTreeMap::new();
    let root = environment.mappings_dir();
    if !root.is_dir() {
        return mappings;
    }
    for layer in [DEFAULT_MAPPINGS_DIR, index] {
        let dir = root.join(layer);
        if dir.is_dir() {
            for (mapping_type, source) in read_mappings_dir(&dir) {
                mappings.insert(mapping_type, source);
            }
        }
    }
    mappings
}

fn read_mappings_dir(dir: &Path) -> BTreeMap<String, String> {
    let mut mappings = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("failed to list mappings directory [{}], ignoring: {err}", dir.display());
            return mappings;
        }
    };
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!("failed to read mappings directory entry in [{}], ignoring: {err}", dir.display());
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let mapping_type = match mapping_type_of(&path) {
            Some(mapping_type) => mapping_type,
            None => {
                warn!("mapping file [{}] has no extension, ignoring", path.display());
                continue;
            }
        };
        if mappings.contains_key(&mapping_type) {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(source) => {
                mappings.insert(mapping_type, source);
            }
            Err(err) => {
                warn!(
                    "failed to read mapping [{mapping_type}] from [{}], ignoring: {err}",
                    path.display()
                );
            }
        }
    }
    mappings
}

/// Basename up to the last dot. A dotless file is an operator error.
fn mapping_type_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.rsplit_once('.')?.0;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn missing_mappings_tree_yields_empty_set() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::new(tmp.path());
        assert!(load_index_mappings(&env, "logs").is_empty());
    }

    #[test]
    fn index_layer_overrides_defaults() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::new(tmp.path());
        let root = env.mappings_dir();
        write(&root.join("_default"), "doc.json", r#"{"layer":"default"}"#);
        write(&root.join("_default"), "event.json", r#"{"layer":"default"}"#);
        write(&root.join("logs"), "doc.json", r#"{"layer":"index"}"#);

        let mappings = load_index_mappings(&env, "logs");
        assert_eq!(mappings.get("doc").map(String::as_str), Some(r#"{"layer":"index"}"#));
        assert_eq!(mappings.get("event").map(String::as_str), Some(r#"{"layer":"default"}"#));
    }

    #[test]
    fn other_indexes_do_not_leak_their_overrides() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::new(tmp.path());
        let root = env.mappings_dir();
        write(&root.join("events"), "doc.json", r#"{"layer":"events"}"#);

        assert!(load_index_mappings(&env, "logs").is_empty());
    }

    #[test]
    fn extension_is_stripped_and_dotless_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let env = Environment::new(tmp.path());
        let dir = env.mappings_dir().join("_default");
        write(&dir, "doc.mapping.json", r#"{"a":1}"#);
        write(&dir, "README", "not a mapping");

        let mappings = load_index_mappings(&env, "logs");
        assert_eq!(mappings.len(), 1);
        assert!(mappings.contains_key("doc.mapping"));
    }
}

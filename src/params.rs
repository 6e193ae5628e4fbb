use crate::error::PipelineError;

/// Character that may never appear in a parameter key or value. Checked
/// before any process is spawned.
pub const SEPARATOR: char = ';';

/// Caller-supplied keys that must never reach an external tool: the JSONP
/// callback marker and the cache-buster artifact some clients append.
const CONTROL_KEYS: &[&str] = &["callback", "_", ""];

/// An order-preserving string-to-string parameter map.
///
/// Tools in the pipeline accept an open, tool-defined set of named
/// parameters, so no fixed struct fits here. Insertion order is kept so the
/// built command vector is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value found under any of the given key spellings. Tools accept
    /// short and long spellings interchangeably, so lookups do too.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    pub fn contains_any(&self, keys: &[&str]) -> bool {
        self.get_any(keys).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rejects any key or value containing the command separator.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (key, value) in self.iter() {
            if key.contains(SEPARATOR) || value.contains(SEPARATOR) {
                return Err(PipelineError::IllegalArgument(format!(
                    "'{SEPARATOR}' is not allowed in {key}"
                )));
            }
        }
        Ok(())
    }

    /// Drops control keys that are part of the calling convention rather
    /// than input to any tool.
    pub fn strip_control(&mut self) {
        self.entries
            .retain(|(key, _)| !CONTROL_KEYS.contains(&key.as_str()));
    }

    /// Emits ordered flag/value token pairs, suppressing any parameter whose
    /// canonical flag appears in `skip`. Used by variants that manage certain
    /// flags themselves (output directory, output format).
    pub fn to_args(&self, skip: &[&str]) -> Vec<String> {
        let mut args = Vec::with_capacity(self.entries.len() * 2);
        for (key, value) in self.iter() {
            let flag = canonical_flag(key);
            if skip.contains(&flag.as_str()) {
                continue;
            }
            args.push(flag);
            args.push(value.to_string());
        }
        args
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Params {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Canonical dash form of a parameter name: one-character names get a single
/// dash, names longer than two characters get a double dash, anything else a
/// single dash. Dashes the caller already supplied are normalized away first,
/// so `u`, `-u` and `url`, `--url` all land on the same flags.
pub fn canonical_flag(key: &str) -> String {
    let bare = key.trim_start_matches('-');
    if bare.len() > 2 {
        format!("--{bare}")
    } else {
        format!("-{bare}")
    }
}

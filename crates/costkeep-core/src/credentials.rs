//! Provider credential lookup.
//!
//! Credentials are keyed by their source id, which for every built-in
//! provider is the name of an environment variable (`OPENAI_API_KEY`, ...).

use std::collections::HashMap;

/// Resolved provider credentials, keyed by credential-source id.
///
/// Empty or whitespace-only values are treated as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    values: HashMap<String, String>,
}

impl Credentials {
    /// Read the given variables from the process environment.
    #[must_use]
    pub fn from_env<'a, I>(vars: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_lookup(vars, |key| std::env::var(key).ok())
    }

    /// Resolve the given source ids through an arbitrary lookup function.
    #[must_use]
    pub fn from_lookup<'a, I, F>(vars: I, lookup: F) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&str) -> Option<String>,
    {
        let values = vars
            .into_iter()
            .filter_map(|var| lookup(var).map(|value| (var.to_string(), value)))
            .filter(|(_, value)| !value.trim().is_empty())
            .collect();
        Self { values }
    }

    /// Builder-style insert, mostly for tests.
    #[must_use]
    pub fn with(mut self, var: &str, value: &str) -> Self {
        if !value.trim().is_empty() {
            self.values.insert(var.to_string(), value.to_string());
        }
        self
    }

    #[must_use]
    pub fn get(&self, var: &str) -> Option<&str> {
        self.values.get(var).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, var: &str) -> bool {
        self.values.contains_key(var)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Credentials")
            .field("present", &names)
            .finish_non_exhaustive()
    }
}

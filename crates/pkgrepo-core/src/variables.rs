//! `RepoVariables`: `$releasever`/`$arch`/`$basearch` substitution.
//!
//! Variables are resolved against a small, always-present built-in set
//! (`releasever`, `arch`, `basearch`) overlaid with whatever the `Context`
//! was told about the running system, plus any ad-hoc variables a caller
//! registers. Substitution is iterative but bounded, so a variable whose
//! value itself references another variable resolves correctly without
//! letting a mistakenly self-referential definition loop forever.

use std::collections::HashMap;

use pkgrepo_repoinfo::VariableResolver;

/// Maximum rounds of substitution before giving up and returning the text
/// as last resolved — guards against `$a` expanding to `$b` expanding to
/// `$a`.
const MAX_SUBSTITUTION_ROUNDS: usize = 8;

/// Holds `$releasever`/`$arch`/`$basearch` and any extra variables a
/// `.repo` URL may reference.
#[derive(Debug, Clone)]
pub struct RepoVariables {
    values: HashMap<String, String>,
}

impl RepoVariables {
    /// Build the variable set from the running system's release version and
    /// CPU architecture. `basearch` is derived from `arch` (e.g. `i686` ->
    /// `i586`'s basearch is `i586`; generally `basearch == arch` except on
    /// multilib architecture families, left to the caller to override via
    /// [`Self::set`] when that distinction matters).
    pub fn new(releasever: impl Into<String>, arch: impl Into<String>) -> Self {
        let arch = arch.into();
        let mut values = HashMap::new();
        values.insert("releasever".to_string(), releasever.into());
        values.insert("basearch".to_string(), arch.clone());
        values.insert("arch".to_string(), arch);
        Self { values }
    }

    /// Register or overwrite a variable. `name` is the bare name, without
    /// the leading `$`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Current value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn substitute_once(&self, input: &str) -> (String, bool) {
        let mut out = String::with_capacity(input.len());
        let mut changed = false;
        let mut rest = input;

        while let Some(dollar) = rest.find('$') {
            out.push_str(&rest[..dollar]);
            let after_dollar = &rest[dollar + 1..];

            let (name, token_len) = if let Some(braced) = after_dollar.strip_prefix('{') {
                match braced.find('}') {
                    Some(end) => (&braced[..end], end + 2),
                    None => ("", 0),
                }
            } else {
                let end = after_dollar
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after_dollar.len());
                (&after_dollar[..end], end)
            };

            if token_len == 0 || name.is_empty() {
                out.push('$');
                rest = after_dollar;
                continue;
            }

            match self.values.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    // spec: missing variables expand to the empty string,
                    // not to the literal `$name` text.
                }
            }
            changed = true;
            rest = &after_dollar[token_len..];
        }
        out.push_str(rest);
        (out, changed)
    }
}

impl VariableResolver for RepoVariables {
    fn resolve(&self, raw: &str) -> String {
        let mut current = raw.to_string();
        for _ in 0..MAX_SUBSTITUTION_ROUNDS {
            let (next, changed) = self.substitute_once(&current);
            if !changed {
                return next;
            }
            current = next;
        }
        current
    }
}

use std::collections::BTreeMap;

use daq_process::EnvironmentMap;

/// Prefix the supervisor uses for host variables in program settings.
pub const ENV_PREFIX: &str = "ENV_";

pub fn placeholder(key: &str) -> String {
    format!("%({key})s")
}

/// Replaces every `%(KEY)s` whose key is in `vars`.
///
/// Single left-to-right pass: substituted values are not re-expanded, and
/// placeholders with unknown keys are kept verbatim.
pub fn substitute(template: &str, vars: &BTreeMap<String, String>) -> String {
    if vars.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("%(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find(")s") {
            Some(end) if vars.contains_key(&after[..end]) => {
                out.push_str(&vars[&after[..end]]);
                rest = &after[end + 2..];
            }
            _ => {
                out.push_str("%(");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Closed set of host variables the control plane expands itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderVocabulary {
    keys: Vec<String>,
}

impl PlaceholderVocabulary {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// `ENV_<KEY>` → value for every recognised key present in `env`.
    pub fn variables(&self, env: &EnvironmentMap) -> BTreeMap<String, String> {
        self.keys
            .iter()
            .filter_map(|k| env.get(k).map(|v| (format!("{ENV_PREFIX}{k}"), v.clone())))
            .collect()
    }
}

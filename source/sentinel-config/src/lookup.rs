//! Typed, inheritance-aware lookup over a parsed [`Document`], per spec.md
//! §3 ("Inheritance") and §4.1 ("Lookup"). Lookup never fails: a missing key
//! simply resolves to `None` at every level of the chain.

use std::collections::HashMap;

use crate::document::Document;

/// A loaded configuration tree. Cheap to keep around by value; wrap it in
/// `arc_swap::ArcSwap` at the call site for hot reload (spec.md §5).
#[derive(Debug, Clone)]
pub struct ConfigTree {
    document: Document,
}

impl ConfigTree {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Raw string lookup walking the chain: `section`, then the nearest
    /// ancestor `.../default`, then `/settings/default`, then
    /// `module_defaults` (the defaults registered by the owning module).
    pub fn get_raw(&self, section: &str, key: &str, module_defaults: &HashMap<String, String>) -> Option<String> {
        if let Some(v) = self.document.section(section).and_then(|s| s.get(key)) {
            return Some(v.to_string());
        }

        for ancestor_default in ancestor_default_paths(section) {
            if let Some(v) = self.document.section(&ancestor_default).and_then(|s| s.get(key)) {
                return Some(v.to_string());
            }
        }

        if let Some(v) = self.document.section("/settings/default").and_then(|s| s.get(key)) {
            return Some(v.to_string());
        }

        module_defaults.get(key).cloned()
    }

    pub fn get_string(&self, section: &str, key: &str, module_defaults: &HashMap<String, String>) -> Option<String> {
        self.get_raw(section, key, module_defaults)
    }

    /// Accepts `true|false|yes|no|1|0|enabled|disabled`, case-insensitively.
    pub fn get_bool(&self, section: &str, key: &str, module_defaults: &HashMap<String, String>) -> Option<bool> {
        let raw = self.get_raw(section, key, module_defaults)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "enabled" => Some(true),
            "false" | "no" | "0" | "disabled" => Some(false),
            _ => None,
        }
    }

    pub fn get_int(&self, section: &str, key: &str, module_defaults: &HashMap<String, String>) -> Option<i64> {
        self.get_raw(section, key, module_defaults)?.trim().parse().ok()
    }

    /// Parses `<num><unit>` with `unit ∈ {ms, s, m, h, d}`, returning
    /// seconds as `f64`.
    pub fn get_duration(&self, section: &str, key: &str, module_defaults: &HashMap<String, String>) -> Option<f64> {
        let raw = self.get_raw(section, key, module_defaults)?;
        parse_duration_seconds(raw.trim())
    }
}

fn parse_duration_seconds(raw: &str) -> Option<f64> {
    let unit_start = raw.find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')?;
    let (num, unit) = raw.split_at(unit_start);
    let num: f64 = num.parse().ok()?;
    let seconds_per_unit = match unit {
        "ms" => 0.001,
        "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        "d" => 86_400.0,
        _ => return None,
    };
    Some(num * seconds_per_unit)
}

/// Yields `.../default` candidate section paths from nearest ancestor to
/// furthest, e.g. for `/settings/sub/leaf`: `/settings/sub/default`, then
/// `/settings/default`.
fn ancestor_default_paths(section: &str) -> Vec<String> {
    let mut segments: Vec<&str> = section.split('/').filter(|s| !s.is_empty()).collect();
    let mut out = Vec::new();
    while !segments.is_empty() {
        segments.pop();
        let prefix = segments.join("/");
        out.push(format!("/{prefix}/default").replace("//", "/"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn empty_defaults() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn inheritance_chain_resolves_across_three_levels() {
        let input = "[/settings/default]\na = 1\n\n[/settings/sub/default]\nb = 2\n\n[/settings/sub/leaf]\nc = 3\n";
        let doc = Document::parse(input, "f.ini").unwrap();
        let tree = ConfigTree::new(doc);
        let defaults = empty_defaults();

        assert_eq!(tree.get_string("/settings/sub/leaf", "a", &defaults), Some("1".into()));
        assert_eq!(tree.get_string("/settings/sub/leaf", "b", &defaults), Some("2".into()));
        assert_eq!(tree.get_string("/settings/sub/leaf", "c", &defaults), Some("3".into()));
    }

    #[test]
    fn module_defaults_are_the_final_fallback() {
        let doc = Document::parse("[/settings/WEB/server]\nport = 8443\n", "f.ini").unwrap();
        let tree = ConfigTree::new(doc);
        let mut defaults = HashMap::new();
        defaults.insert("timeout".to_string(), "60s".to_string());

        assert_eq!(tree.get_string("/settings/WEB/server", "timeout", &defaults), Some("60s".into()));
        assert_eq!(tree.get_string("/settings/WEB/server", "missing", &defaults), None);
    }

    #[test]
    fn bool_parsing_accepts_all_spellings_case_insensitively() {
        let doc = Document::parse("[/a]\nx = YES\ny = Disabled\n", "f.ini").unwrap();
        let tree = ConfigTree::new(doc);
        let defaults = empty_defaults();
        assert_eq!(tree.get_bool("/a", "x", &defaults), Some(true));
        assert_eq!(tree.get_bool("/a", "y", &defaults), Some(false));
    }

    #[test]
    fn duration_parsing_converts_to_seconds() {
        let doc = Document::parse("[/a]\nt1 = 500ms\nt2 = 5m\nt3 = 2h\n", "f.ini").unwrap();
        let tree = ConfigTree::new(doc);
        let defaults = empty_defaults();
        assert_eq!(tree.get_duration("/a", "t1", &defaults), Some(0.5));
        assert_eq!(tree.get_duration("/a", "t2", &defaults), Some(300.0));
        assert_eq!(tree.get_duration("/a", "t3", &defaults), Some(7200.0));
    }
}

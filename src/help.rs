// ABOUTME: Help system deriving the method reference from registered method specs

use crate::methods::{self, MethodSpec};

/// A rendered help entry for one built-in method.
#[derive(Debug, Clone)]
pub struct HelpEntry {
    pub name: String,
    pub signature: String,
    pub summary: String,
    pub examples: Vec<String>,
    pub category: String,
}

fn entry(spec: &MethodSpec) -> HelpEntry {
    let signature = if spec.arity == 0 {
        format!("{}.{}", spec.receiver, spec.name)
    } else {
        let params: Vec<String> = (1..=spec.arity).map(|i| format!("a{}", i)).collect();
        format!("{}.{}({})", spec.receiver, spec.name, params.join(", "))
    };
    HelpEntry {
        name: spec.name.to_string(),
        signature,
        summary: spec.summary.to_string(),
        examples: spec.examples.iter().map(|s| s.to_string()).collect(),
        category: spec.category.to_string(),
    }
}

/// All help entries grouped by category, categories and entries sorted.
pub fn by_category() -> Vec<(String, Vec<HelpEntry>)> {
    let mut groups: Vec<(String, Vec<HelpEntry>)> = Vec::new();
    for spec in methods::all() {
        let help = entry(spec);
        match groups.iter_mut().find(|(cat, _)| *cat == help.category) {
            Some((_, entries)) => entries.push(help),
            None => groups.push((help.category.clone(), vec![help])),
        }
    }
    groups
}

/// Look up help for a single method name (any receiver).
pub fn lookup(name: &str) -> Option<HelpEntry> {
    methods::lookup_any(name).map(entry)
}

/// The full method reference as markdown, rendered by the REPL.
pub fn reference_markdown() -> String {
    let mut out = String::from("# Built-in methods\n");
    for (category, entries) in by_category() {
        out.push_str(&format!("\n## {}\n\n", category));
        for help in entries {
            out.push_str(&format!("* **{}** - {}\n", help.signature, help.summary));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_contains_core_methods() {
        let text = reference_markdown();
        assert!(text.contains("string.upper"));
        assert!(text.contains("list.has(a1)"));
        assert!(text.contains("dict.keys"));
    }

    #[test]
    fn test_lookup_by_name() {
        let help = lookup("pad_start").expect("pad_start is registered");
        assert_eq!(help.signature, "string.pad_start(a1, a2)");
        assert!(!help.summary.is_empty());
    }

    #[test]
    fn test_examples_extracted_from_docs() {
        let help = lookup("upper").expect("upper is registered");
        assert!(help.examples.iter().any(|e| e.contains("ABC")));
    }
}

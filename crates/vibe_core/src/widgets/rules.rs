#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub id: String,
    pub filename: String,
    pub name: String,
    pub size: u64,
}

/// Project rule files and the user's selection among them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleSelection {
    rules: Vec<RuleEntry>,
    selected: Vec<String>,
}

impl RuleSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rule list, dropping selections whose file is gone.
    pub fn set_rules(&mut self, rules: Vec<RuleEntry>) {
        self.selected
            .retain(|filename| rules.iter().any(|rule| &rule.filename == filename));
        self.rules = rules;
    }

    pub fn rules(&self) -> &[RuleEntry] {
        &self.rules
    }

    /// Toggles `filename`; returns whether it is selected afterwards.
    pub fn toggle(&mut self, filename: &str) -> bool {
        if let Some(idx) = self.selected.iter().position(|f| f == filename) {
            self.selected.remove(idx);
            false
        } else {
            self.selected.push(filename.to_string());
            true
        }
    }

    pub fn is_selected(&self, filename: &str) -> bool {
        self.selected.iter().any(|f| f == filename)
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn selected_names(&self) -> Vec<String> {
        self.selected.iter().map(|f| display_name(f)).collect()
    }
}

/// `code_style_rules.md` becomes `Code Style Rules`.
pub fn display_name(filename: &str) -> String {
    let stem = filename.replacen(".md", "", 1).replace('_', " ");
    let mut out = String::with_capacity(stem.len());
    let mut at_word_start = true;
    for c in stem.chars() {
        if at_word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}

pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

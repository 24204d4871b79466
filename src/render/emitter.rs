//! Indented line emitter
//!
//! Nesting is tracked by an explicit counter; every line is prefixed with
//! two spaces per level and terminated with `\n`.

use super::yaml;
use crate::error::Result;

const INDENT: &str = "  ";

/// Line-oriented writer with explicit indentation
#[derive(Debug, Default)]
pub struct Emitter {
    buf: String,
    indent: usize,
    /// Next line opens a sequence item (`- `)
    pending_item: bool,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting level
    pub fn depth(&self) -> usize {
        self.indent
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write one line at the current level
    pub fn line(&mut self, text: impl AsRef<str>) {
        if self.pending_item {
            self.pending_item = false;
            self.push_prefix(self.indent.saturating_sub(1));
            self.buf.push_str("- ");
        } else {
            self.push_prefix(self.indent);
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    fn push_prefix(&mut self, level: usize) {
        for _ in 0..level {
            self.buf.push_str(INDENT);
        }
    }

    /// Write an empty line
    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Write `# text`
    pub fn comment(&mut self, text: impl AsRef<str>) {
        self.line(format!("# {}", text.as_ref()));
    }

    /// Write `key:` opening a nested block
    pub fn key(&mut self, key: &str) {
        self.line(format!("{}:", key));
    }

    /// Write `key: value`, quoting the value only when needed
    pub fn scalar(&mut self, key: &str, value: &str) {
        self.line(format!("{}: {}", key, yaml::scalar(value)));
    }

    /// Write `key: "value"`
    pub fn quoted(&mut self, key: &str, value: &str) {
        self.line(format!("{}: {}", key, yaml::quote(value)));
    }

    /// Write `key: value` verbatim
    pub fn raw(&mut self, key: &str, value: impl std::fmt::Display) {
        self.line(format!("{}: {}", key, value));
    }

    /// Write `- value`, quoting the value only when needed
    pub fn item(&mut self, value: &str) {
        self.line(format!("- {}", yaml::scalar(value)));
    }

    /// Write `- "value"`
    pub fn quoted_item(&mut self, value: &str) {
        self.line(format!("- {}", yaml::quote(value)));
    }

    /// Write `key:` and run `body` one level deeper
    pub fn block<F>(&mut self, key: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.key(key);
        self.indent();
        let result = body(self);
        self.dedent();
        result
    }

    /// Write a sequence item whose body is a mapping; the first line of
    /// `body` carries the `- ` marker
    pub fn item_block<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.indent();
        self.pending_item = true;
        let result = body(self);
        self.pending_item = false;
        self.dedent();
        result
    }

    /// Write a `key:` block of `name: "value"` pairs; names are quoted
    /// when a YAML reader would not keep them as plain keys
    pub fn quoted_map<'a, I>(&mut self, key: &str, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        self.block(key, |e| {
            for (name, value) in entries {
                e.line(format!("{}: {}", yaml::scalar(name), yaml::quote(value)));
            }
            Ok(())
        })
    }

    /// Consume the emitter and return the text
    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn test_nested_blocks() {
        let mut e = Emitter::new();
        e.block("services", |e| {
            e.block("web", |e| {
                e.scalar("image", "nginx:latest");
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(e.depth(), 0);
        assert_eq!(e.finish(), "services:\n  web:\n    image: nginx:latest\n");
    }

    #[test]
    fn test_item_block() {
        let mut e = Emitter::new();
        e.block("configs", |e| {
            e.item_block(|e| {
                e.scalar("source", "app");
                e.scalar("target", "/etc/app.conf");
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(
            e.finish(),
            "configs:\n  - source: app\n    target: /etc/app.conf\n"
        );
    }

    #[test]
    fn test_items_and_comments() {
        let mut e = Emitter::new();
        e.indent();
        e.comment("note");
        e.quoted_item("3000:3000");
        e.item("/data");
        e.dedent();
        assert_eq!(e.finish(), "  # note\n  - \"3000:3000\"\n  - /data\n");
    }

    #[test]
    fn test_quoted_map_keys() {
        let entries: IndexMap<String, String> = [
            ("com.example.tier".to_string(), "web".to_string()),
            ("# com.x: y".to_string(), "1".to_string()),
        ]
        .into_iter()
        .collect();
        let mut e = Emitter::new();
        e.quoted_map("labels", &entries).unwrap();
        let text = e.finish();
        assert_eq!(
            text,
            "labels:\n  com.example.tier: \"web\"\n  \"# com.x: y\": \"1\"\n"
        );
        let doc: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(doc["labels"]["# com.x: y"].as_str(), Some("1"));
    }
}

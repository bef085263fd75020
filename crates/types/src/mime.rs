use std::collections::HashMap;

const EMBEDDED_TABLE: &str = include_str!("mime.json");

/// Read-only extension -> MIME type table.
///
/// Loaded once at start-up and shared with the router; keys carry the leading
/// dot (`.html`).
#[derive(Debug, Clone, Default)]
pub struct MimeTable {
    types: HashMap<String, String>,
}

impl MimeTable {
    /// Parse the table shipped with the crate.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        Self::from_json(EMBEDDED_TABLE)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: HashMap<String, String> = serde_json::from_str(raw)?;
        let types = parsed
            .into_iter()
            .map(|(ext, mime)| (ext.to_ascii_lowercase(), mime))
            .collect();
        Ok(Self { types })
    }

    /// MIME type for an extension such as `.md`, if known.
    pub fn lookup(&self, extension: &str) -> Option<&str> {
        if extension.is_empty() {
            return None;
        }
        self.types
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_table_parses() {
        let table = MimeTable::embedded().unwrap();
        assert!(!table.is_empty());
        assert_eq!(table.lookup(".html"), Some("text/html"));
        assert_eq!(table.lookup(".PNG"), Some("image/png"));
    }

    #[test]
    fn unknown_or_empty_extension_is_none() {
        let table = MimeTable::embedded().unwrap();
        assert_eq!(table.lookup(".nope"), None);
        assert_eq!(table.lookup(""), None);
    }
}

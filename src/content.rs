//! Localized line content.
//!
//! A string table is a CSV file with an `id` column and one column per locale
//! key:
//!
//! ```text
//! id,en,fr
//! guard_hello,Halt!,Halte !
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use log::*;

use crate::errors::{ContentError, StringTableError};

pub const ID_COLUMN: &str = "id";

/// Suffix appended to a graph's source id to name its string table file.
pub const STRING_TABLE_POSTFIX: &str = "_lines.csv";

/// Maps a line id and a locale key to the text to display.
pub trait ContentResolver {
    fn resolve(&self, line_id: &str, locale: &str) -> Result<&str, ContentError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringTable {
    lines: HashMap<String, HashMap<String, String>>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, StringTableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        if !csv_reader.headers()?.iter().any(|header| header == ID_COLUMN) {
            return Err(StringTableError::MissingIdColumn(ID_COLUMN));
        }

        let mut table = Self::new();
        for record in csv_reader.deserialize() {
            let mut record: HashMap<String, String> = record?;
            let id = record.remove(ID_COLUMN).unwrap_or_default();
            if id.is_empty() {
                warn!("Skipping string table row without an id");
                continue;
            }
            if table.lines.insert(id.clone(), record).is_some() {
                warn!("Line '{}' appears twice in the string table, keeping the last one", id);
            }
        }

        debug!("Loaded {} lines", table.lines.len());
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StringTableError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn insert(&mut self, line_id: impl Into<String>, locale: impl Into<String>, text: impl Into<String>) {
        self.lines.entry(line_id.into())
            .or_default()
            .insert(locale.into(), text.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains(&self, line_id: &str) -> bool {
        self.lines.contains_key(line_id)
    }
}

impl ContentResolver for StringTable {
    fn resolve(&self, line_id: &str, locale: &str) -> Result<&str, ContentError> {
        // Lines nobody filled in yet have no id and show nothing.
        if line_id.is_empty() {
            return Ok("");
        }
        let line = self.lines.get(line_id)
            .ok_or_else(|| ContentError::ContentNotFound { line_id: line_id.to_string() })?;
        line.get(locale)
            .map(String::as_str)
            .ok_or_else(|| ContentError::LocaleNotFound {
                line_id: line_id.to_string(),
                locale: locale.to_string(),
            })
    }
}

/// Resolves a line, logging and falling back to empty text on a miss.
pub fn resolve_or_empty(resolver: &dyn ContentResolver, line_id: &str, locale: &str) -> String {
    match resolver.resolve(line_id, locale) {
        Ok(text) => text.to_string(),
        Err(err) => {
            warn!("{}", err);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
id,en,fr
guard_hello,Halt!,Halte !
guard_bye,  Move along.  ,
intro_only_en,Welcome,
";

    #[test]
    fn resolves_lines_by_locale() {
        let table = StringTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve("guard_hello", "en"), Ok("Halt!"));
        assert_eq!(table.resolve("guard_hello", "fr"), Ok("Halte !"));
        assert_eq!(table.resolve("guard_bye", "en"), Ok("Move along."));
        // An empty cell is still an entry.
        assert_eq!(table.resolve("intro_only_en", "fr"), Ok(""));
    }

    #[test]
    fn unknown_line_is_content_not_found() {
        let table = StringTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(
            table.resolve("nope", "en"),
            Err(ContentError::ContentNotFound { line_id: "nope".to_string() })
        );
        assert_eq!(resolve_or_empty(&table, "nope", "en"), "");
    }

    #[test]
    fn unknown_locale_is_locale_not_found() {
        let table = StringTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(
            table.resolve("guard_hello", "de"),
            Err(ContentError::LocaleNotFound {
                line_id: "guard_hello".to_string(),
                locale: "de".to_string(),
            })
        );
    }

    #[test]
    fn empty_line_id_resolves_to_empty_text() {
        let table = StringTable::new();
        assert_eq!(table.resolve("", "en"), Ok(""));
    }

    #[test]
    fn table_without_id_column_is_rejected() {
        let result = StringTable::from_reader("key,en\na,b\n".as_bytes());
        assert!(matches!(result, Err(StringTableError::MissingIdColumn("id"))));
    }

    #[test]
    fn inserted_lines_resolve() {
        let mut table = StringTable::new();
        table.insert("a", "en", "Hello");
        table.insert("a", "fr", "Bonjour");
        assert!(table.contains("a"));
        assert_eq!(table.resolve("a", "fr"), Ok("Bonjour"));
    }
}

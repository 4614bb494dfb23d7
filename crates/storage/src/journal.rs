//! Journal of structural model changes.
//!
//! When enabled in the model configuration, every table/class creation,
//! deletion and reinterpretation is appended here in order.

/// A single journal entry.
#[derive(Clone, Debug, PartialEq)]
pub enum JournalEntry {
    /// A table was created.
    TableCreated { table_id: u64, type_name: &'static str },
    /// A table was deleted.
    TableDeleted { table_id: u64 },
    /// A table's cache was reset.
    TableReset { table_id: u64 },
    /// A class was created.
    ClassCreated { class_id: u64, table_id: u64, type_name: &'static str },
    /// A class was reinterpreted as another class type.
    ClassReinterpreted { class_id: u64, type_name: &'static str },
    /// A class was deleted.
    ClassDeleted { class_id: u64 },
}

impl JournalEntry {
    /// Returns the table id this entry concerns, if any.
    pub fn table_id(&self) -> Option<u64> {
        match self {
            JournalEntry::TableCreated { table_id, .. } => Some(*table_id),
            JournalEntry::TableDeleted { table_id } => Some(*table_id),
            JournalEntry::TableReset { table_id } => Some(*table_id),
            JournalEntry::ClassCreated { table_id, .. } => Some(*table_id),
            JournalEntry::ClassReinterpreted { .. } | JournalEntry::ClassDeleted { .. } => None,
        }
    }

    /// Returns the class id this entry concerns, if any.
    pub fn class_id(&self) -> Option<u64> {
        match self {
            JournalEntry::ClassCreated { class_id, .. }
            | JournalEntry::ClassReinterpreted { class_id, .. }
            | JournalEntry::ClassDeleted { class_id } => Some(*class_id),
            _ => None,
        }
    }
}

/// Append-only change log.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Returns all entries in order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries concerning one table.
    pub fn for_table(&self, table_id: u64) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|e| e.table_id() == Some(table_id))
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_record_and_filter() {
        let mut journal = Journal::new();
        journal.record(JournalEntry::TableCreated {
            table_id: 1,
            type_name: "StaticTable",
        });
        journal.record(JournalEntry::ClassCreated {
            class_id: 1,
            table_id: 1,
            type_name: "GenericClass",
        });
        journal.record(JournalEntry::TableDeleted { table_id: 2 });

        assert_eq!(journal.len(), 3);
        assert_eq!(journal.for_table(1).len(), 2);
        assert_eq!(journal.entries()[1].class_id(), Some(1));

        journal.clear();
        assert!(journal.is_empty());
    }
}

//! Read selections: which groups and tables a read should touch.

use std::collections::{BTreeMap, BTreeSet};

use fovea_common::{Result, error::Error};
use fovea_schema::{DatasetSchema, Group};

/// Selection of tables for a cross-table read: a set of group tags,
/// optionally narrowed to explicit table names per group. The empty
/// selection means everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadSelection {
    groups: BTreeSet<Group>,
    tables: BTreeMap<Group, BTreeSet<String>>,
}

impl ReadSelection {
    /// Selects every table of the dataset.
    pub fn all() -> ReadSelection {
        ReadSelection::default()
    }

    /// Selects every table of one group.
    pub fn group(group: Group) -> ReadSelection {
        ReadSelection {
            groups: BTreeSet::from([group]),
            tables: BTreeMap::new(),
        }
    }

    /// Selects every table of the given groups.
    pub fn groups(groups: impl IntoIterator<Item = Group>) -> ReadSelection {
        ReadSelection {
            groups: groups.into_iter().collect(),
            tables: BTreeMap::new(),
        }
    }

    /// Narrows a group to explicit table names (adding the group to the
    /// selection if absent).
    pub fn with_tables(
        mut self,
        group: Group,
        tables: impl IntoIterator<Item = impl Into<String>>,
    ) -> ReadSelection {
        self.groups.insert(group);
        self.tables
            .entry(group)
            .or_default()
            .extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn is_all(&self) -> bool {
        self.groups.is_empty() && self.tables.is_empty()
    }

    /// Enumerates the tables this selection reads from `schema`,
    /// validating explicit names.
    pub(crate) fn resolve(&self, schema: &DatasetSchema) -> Result<SelectedTables> {
        if self.is_all() {
            return Ok(SelectedTables {
                item_fields: true,
                tables: schema.related_tables().iter().map(|t| t.to_string()).collect(),
            });
        }
        let mut item_fields = false;
        let mut tables: Vec<String> = Vec::new();
        for group in &self.groups {
            if *group == Group::Item {
                item_fields = true;
                continue;
            }
            match self.tables.get(group) {
                Some(named) => {
                    for name in named {
                        let table = schema.table(name)?;
                        if table.group() != *group {
                            return Err(Error::table_not_found(name.clone()));
                        }
                        tables.push(name.clone());
                    }
                }
                None => {
                    tables.extend(
                        schema
                            .tables_in_group(*group)
                            .iter()
                            .map(|t| t.to_string()),
                    );
                }
            }
        }
        tables.sort();
        tables.dedup();
        Ok(SelectedTables {
            item_fields,
            tables,
        })
    }
}

/// A selection resolved against one dataset schema.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectedTables {
    /// Whether the item table's own fields are part of the read.
    pub item_fields: bool,
    /// Non-item tables to read.
    pub tables: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fovea_schema::ItemShape;

    fn schema() -> DatasetSchema {
        let shape = ItemShape::builder()
            .table("image", "image")
            .table_list("objects", "object")
            .table_list("embeddings", "embedding")
            .build()
            .unwrap();
        DatasetSchema::from_item_shape(&shape).unwrap()
    }

    #[test]
    fn empty_selection_reads_everything() {
        let resolved = ReadSelection::all().resolve(&schema()).unwrap();
        assert!(resolved.item_fields);
        assert_eq!(resolved.tables, vec!["embeddings", "image", "objects"]);
    }

    #[test]
    fn group_selection_reads_group_tables() {
        let resolved = ReadSelection::group(Group::View).resolve(&schema()).unwrap();
        assert!(!resolved.item_fields);
        assert_eq!(resolved.tables, vec!["image"]);
    }

    #[test]
    fn explicit_tables_are_validated() {
        let selection = ReadSelection::all().with_tables(Group::Object, ["objects"]);
        let resolved = selection.resolve(&schema()).unwrap();
        assert_eq!(resolved.tables, vec!["objects"]);

        let bad = ReadSelection::all().with_tables(Group::Object, ["image"]);
        assert!(bad.resolve(&schema()).is_err());

        let missing = ReadSelection::all().with_tables(Group::View, ["lidar"]);
        assert!(missing.resolve(&schema()).is_err());
    }
}

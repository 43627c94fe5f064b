//! Two tables described together with their join keys.

use super::Table;
use crate::artifact::Artifact;
use crate::media::{bytes_digest, unbound_error, ArtifactRef, Descriptor, Media};
use crate::result::{MediaError, MediaResult};
use crate::run::Run;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

const JOINED_TYPE: &str = "joined-table";

/// Table owned outside the join and shared with it
pub type SharedTable = Rc<RefCell<Table>>;

/// One join key or an ordered list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinKeys {
    /// Single key
    Single(String),
    /// Composite key, in order
    Many(Vec<String>),
}

impl From<&str> for JoinKeys {
    fn from(key: &str) -> Self {
        Self::Single(key.to_string())
    }
}

impl From<String> for JoinKeys {
    fn from(key: String) -> Self {
        Self::Single(key)
    }
}

impl From<Vec<String>> for JoinKeys {
    fn from(keys: Vec<String>) -> Self {
        Self::Many(keys)
    }
}

impl From<Vec<&str>> for JoinKeys {
    fn from(keys: Vec<&str>) -> Self {
        Self::Many(keys.into_iter().map(str::to_string).collect())
    }
}

/// Pair of tables plus the keys they join on.
///
/// No join is computed; the keys are carried into the artifact descriptor
/// for the consumer. Only artifact binding is meaningful.
#[derive(Debug)]
pub struct JoinedTable {
    tables: [SharedTable; 2],
    join_keys: JoinKeys,
    artifact: Option<ArtifactRef>,
}

impl JoinedTable {
    /// Describe `left` joined with `right` on `join_keys`
    pub fn new(left: SharedTable, right: SharedTable, join_keys: impl Into<JoinKeys>) -> Self {
        Self {
            tables: [left, right],
            join_keys: join_keys.into(),
            artifact: None,
        }
    }

    /// The two constituent tables
    #[must_use]
    pub const fn tables(&self) -> &[SharedTable; 2] {
        &self.tables
    }

    /// Join keys
    #[must_use]
    pub const fn join_keys(&self) -> &JoinKeys {
        &self.join_keys
    }

    /// Artifact from the latest artifact binding
    #[must_use]
    pub const fn artifact(&self) -> Option<&ArtifactRef> {
        self.artifact.as_ref()
    }
}

/// Bind `table` to `artifact` and store its descriptor there under a
/// content-addressed entry; the entry name is the reference.
fn table_reference(table: &SharedTable, artifact: &mut dyn Artifact) -> MediaResult<String> {
    let descriptor = table
        .try_borrow_mut()
        .map_err(|_| MediaError::invalid_state("joined table is already borrowed"))?
        .bind_to_artifact(artifact)?;

    let bytes = serde_json::to_vec(&descriptor)?;
    let digest = bytes_digest(&bytes);
    let entry = format!("media/tables/{}.table.json", &digest[..20]);
    artifact.add_bytes(&entry, &bytes)
}

impl Media for JoinedTable {
    fn class_name(&self) -> &'static str {
        "JoinedTable"
    }

    fn bind_to_run(
        &mut self,
        _run: &mut dyn Run,
        _namespace: &[&str],
        _name: Option<&str>,
    ) -> MediaResult<()> {
        debug!("joined tables are not written to runs; skipping");
        Ok(())
    }

    fn bind_to_artifact(&mut self, artifact: &mut dyn Artifact) -> MediaResult<Descriptor> {
        let [left, right] = &self.tables;
        let table1 = table_reference(left, artifact)?;
        let table2 = table_reference(right, artifact)?;
        self.artifact = Some(ArtifactRef::of(artifact));

        let mut descriptor = Descriptor::new();
        descriptor.insert("_type".into(), JOINED_TYPE.into());
        descriptor.insert("join_keys".into(), serde_json::to_value(&self.join_keys)?);
        descriptor.insert("table1".into(), table1.into());
        descriptor.insert("table2".into(), table2.into());
        Ok(descriptor)
    }

    fn to_json(&self) -> MediaResult<Descriptor> {
        let artifact = self.artifact.as_ref().ok_or_else(unbound_error)?;
        let mut descriptor = Descriptor::new();
        descriptor.insert("_type".into(), JOINED_TYPE.into());
        descriptor.insert("artifact_path".into(), artifact.path.clone().into());
        Ok(descriptor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::artifact::DirArtifact;
    use crate::run::DirRun;
    use crate::table::{Cell, Column};
    use serde_json::json;

    fn shared(rows: &[[i64; 2]]) -> SharedTable {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|&v| Cell::Int(v)).collect())
            .collect();
        let columns = vec![Column::from("id"), Column::from("v")];
        Rc::new(RefCell::new(Table::from_rows(rows, Some(columns)).unwrap()))
    }

    #[test]
    fn test_to_json_before_binding_fails() {
        let joined = JoinedTable::new(shared(&[[1, 2]]), shared(&[[1, 3]]), "id");
        let err = joined.to_json().unwrap_err();
        assert!(err.is_state_error());
        assert!(err.to_string().contains("cannot serialize unbound media object"));
    }

    #[test]
    fn test_bind_to_run_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let mut run = DirRun::new(root.path());
        let mut joined = JoinedTable::new(shared(&[[1, 2]]), shared(&[[1, 3]]), "id");
        joined.bind_to_run(&mut run, &["x"], None).unwrap();
        assert!(run.registered().is_empty());
        assert!(joined.to_json().is_err());
    }

    #[test]
    fn test_artifact_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let mut artifact = DirArtifact::new("joined", root.path());
        let left = shared(&[[1, 2]]);
        let right = shared(&[[1, 3], [2, 4]]);
        let mut joined = JoinedTable::new(Rc::clone(&left), right, vec!["id", "v"]);

        let descriptor = joined.bind_to_artifact(&mut artifact).unwrap();
        assert_eq!(descriptor["_type"], "joined-table");
        assert_eq!(descriptor["join_keys"], json!(["id", "v"]));

        let table1 = descriptor["table1"].as_str().unwrap();
        let table2 = descriptor["table2"].as_str().unwrap();
        assert!(table1.starts_with("media/tables/"));
        assert!(table1.ends_with(".table.json"));
        assert_ne!(table1, table2);
        assert!(artifact.contains(table1));

        let stored: serde_json::Value =
            serde_json::from_slice(&std::fs::read(artifact.entry_path(table1)).unwrap()).unwrap();
        assert_eq!(stored["nrows"], 1);

        // the shared table itself saw the binding
        assert!(left.borrow().to_json().is_ok());

        let json = joined.to_json().unwrap();
        assert_eq!(json["_type"], "joined-table");
        assert_eq!(json["artifact_path"], "artifact://joined");
    }

    #[test]
    fn test_rebinding_gives_same_references() {
        let root = tempfile::tempdir().unwrap();
        let mut artifact = DirArtifact::new("joined", root.path());
        let mut joined = JoinedTable::new(shared(&[[1, 2]]), shared(&[[5, 6]]), "id");

        let first = joined.bind_to_artifact(&mut artifact).unwrap();
        let second = joined.bind_to_artifact(&mut artifact).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_key_serializes_as_string() {
        assert_eq!(
            serde_json::to_value(JoinKeys::from("id")).unwrap(),
            json!("id")
        );
    }
}

//! Tabular media.
//!
//! A `Table` is a fixed set of column labels plus rows of cells. Cells may
//! hold other media; run binding writes them as their class name only,
//! artifact binding replaces them with their own artifact descriptors.

mod joined;

pub use joined::{JoinKeys, JoinedTable, SharedTable};

use crate::artifact::Artifact;
use crate::config::MediaSettings;
use crate::media::{Descriptor, Media, MediaCore, MediaKind, VideoSequence};
use crate::path_slot::PathSlot;
use crate::result::{MediaError, MediaResult};
use crate::run::Run;
use crate::source::{ArraySource, FrameSource};
use crate::video::Video;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column labels used when a table is built without any
pub const DEFAULT_COLUMNS: [&str; 3] = ["Input", "Output", "Expected"];

const TABLE_KIND: MediaKind = MediaKind {
    obj_type: "table-file",
    artifact_type: "table-file",
    relative_path: "media/table",
};

const TABLE_FORMAT: &str = "table.json";

/// Column label: a string or an integer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    /// Named column
    Name(String),
    /// Positional column
    Index(i64),
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<i64> for Column {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl From<i32> for Column {
    fn from(index: i32) -> Self {
        Self::Index(i64::from(index))
    }
}

impl TryFrom<Value> for Column {
    type Error = MediaError;

    fn try_from(value: Value) -> MediaResult<Self> {
        match value {
            Value::String(name) => Ok(Self::Name(name)),
            Value::Number(n) => n.as_i64().map(Self::Index).ok_or_else(|| {
                MediaError::invalid_column(format!("{n} is not an integer label"))
            }),
            other => Err(MediaError::invalid_column(format!(
                "{other} is neither a string nor an integer"
            ))),
        }
    }
}

fn default_columns() -> Vec<Column> {
    DEFAULT_COLUMNS.iter().map(|&c| Column::from(c)).collect()
}

/// One table cell
#[derive(Debug)]
pub enum Cell {
    /// Empty cell
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Unsigned integer above `i64::MAX`
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Text
    Text(String),
    /// Nested sequence
    List(Vec<Cell>),
    /// Nested mapping
    Map(BTreeMap<String, Cell>),
    /// Embedded media object
    Media(Box<dyn Media>),
}

impl Cell {
    /// Wrap a media object
    pub fn media(media: impl Media + 'static) -> Self {
        Self::Media(Box::new(media))
    }

    /// Whether this cell holds a media object
    #[must_use]
    pub const fn is_media(&self) -> bool {
        matches!(self, Self::Media(_))
    }

    /// Value written to the run file; media become their class name
    #[must_use]
    pub fn to_run_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::UInt(u) => Value::from(*u),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_run_value).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_run_value()))
                    .collect(),
            ),
            Self::Media(media) => Value::String(media.class_name().to_string()),
        }
    }

    /// Value written to an artifact descriptor; media are bound to
    /// `artifact` depth-first and replaced by their descriptors
    pub fn bind_to_artifact(&mut self, artifact: &mut dyn Artifact) -> MediaResult<Value> {
        Ok(match self {
            Self::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter_mut() {
                    out.push(item.bind_to_artifact(artifact)?);
                }
                Value::Array(out)
            }
            Self::Map(map) => {
                let mut out = serde_json::Map::new();
                for (key, item) in map.iter_mut() {
                    out.insert(key.clone(), item.bind_to_artifact(artifact)?);
                }
                Value::Object(out)
            }
            Self::Media(media) => Value::Object(media.bind_to_artifact(artifact)?),
            plain => plain.to_run_value(),
        })
    }
}

impl PartialEq for Cell {
    /// Media cells never compare equal
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u64> for Cell {
    fn from(u: u64) -> Self {
        i64::try_from(u).map_or(Self::UInt(u), Self::Int)
    }
}

impl From<i32> for Cell {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Video> for Cell {
    fn from(video: Video) -> Self {
        Self::media(video)
    }
}

impl From<VideoSequence> for Cell {
    fn from(videos: VideoSequence) -> Self {
        Self::media(videos)
    }
}

impl From<Table> for Cell {
    fn from(table: Table) -> Self {
        Self::media(table)
    }
}

/// Accepted table inputs, in dispatch order
pub enum TableInput<'a> {
    /// No data
    Empty,
    /// Array-like source; each outer element is a row
    Array(&'a dyn ArraySource),
    /// Data-frame-like source; supplies its own column labels
    Frame(&'a dyn FrameSource),
    /// Plain rows
    Rows(Vec<Vec<Cell>>),
}

impl fmt::Debug for TableInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Array(_) => f.write_str("Array(..)"),
            Self::Frame(_) => f.write_str("Frame(..)"),
            Self::Rows(rows) => f.debug_tuple("Rows").field(&rows.len()).finish(),
        }
    }
}

/// Rows of data under fixed column labels
#[derive(Debug)]
pub struct Table {
    core: MediaCore,
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table from any accepted input.
    ///
    /// `columns` is ignored for frame inputs; elsewhere `None` selects
    /// `DEFAULT_COLUMNS`.
    pub fn new(input: TableInput<'_>, columns: Option<Vec<Column>>) -> MediaResult<Self> {
        match input {
            TableInput::Empty => Self::from_rows(Vec::new(), columns),
            TableInput::Array(source) => Self::from_array(source, columns),
            TableInput::Frame(source) => Self::from_frame(source),
            TableInput::Rows(rows) => Self::from_rows(rows, columns),
        }
    }

    /// Empty table with the default columns
    #[must_use]
    pub fn empty() -> Self {
        Self {
            core: MediaCore::new(TABLE_KIND),
            columns: default_columns(),
            rows: Vec::new(),
        }
    }

    /// Table from plain rows; every row must match the column count
    pub fn from_rows(rows: Vec<Vec<Cell>>, columns: Option<Vec<Column>>) -> MediaResult<Self> {
        let mut table = Self {
            core: MediaCore::new(TABLE_KIND),
            columns: columns.unwrap_or_else(default_columns),
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.add_data(row)?;
        }
        Ok(table)
    }

    /// Table from an array-like source whose outer elements are rows
    pub fn from_array(source: &dyn ArraySource, columns: Option<Vec<Column>>) -> MediaResult<Self> {
        let Value::Array(outer) = source.to_nested()? else {
            return Err(MediaError::unsupported_input(
                "array data must have at least one dimension",
            ));
        };

        let rows = outer
            .into_iter()
            .map(|row| match row {
                Value::Array(cells) => Ok(cells.into_iter().map(Cell::from).collect()),
                other => Err(MediaError::unsupported_input(format!(
                    "array rows must be sequences, got {other}"
                ))),
            })
            .collect::<MediaResult<Vec<_>>>()?;
        Self::from_rows(rows, columns)
    }

    /// Table from a data-frame-like source, using its column labels
    pub fn from_frame(source: &dyn FrameSource) -> MediaResult<Self> {
        let columns = source
            .column_labels()
            .into_iter()
            .map(Column::try_from)
            .collect::<MediaResult<Vec<_>>>()?;
        let rows = source
            .values()
            .into_iter()
            .map(|row| row.into_iter().map(Cell::from).collect())
            .collect();
        Self::from_rows(rows, Some(columns))
    }

    /// Apply staging settings; only valid before the table is materialized
    pub fn with_settings(mut self, settings: &MediaSettings) -> MediaResult<Self> {
        if let Some(dir) = &settings.staging_dir {
            self.core.replace_slot(PathSlot::in_dir(dir))?;
        }
        Ok(self)
    }

    /// Append one row. Fails without modifying the table when the row
    /// length differs from the column count, or once the backing file has
    /// been written.
    pub fn add_data(&mut self, row: Vec<Cell>) -> MediaResult<()> {
        if self.core.is_materialized() {
            return Err(MediaError::invalid_state(
                "cannot add rows to a table whose file has been written",
            ));
        }
        if row.len() != self.columns.len() {
            return Err(MediaError::RowLength {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column labels
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows in insertion order
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of columns
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// Shared media state
    #[must_use]
    pub const fn core(&self) -> &MediaCore {
        &self.core
    }

    /// Write the run-file form of this table to `path`
    pub fn save(&self, path: &Path) -> MediaResult<()> {
        write_run_file(path, &self.columns, &self.rows)
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

fn run_file_value(columns: &[Column], rows: &[Vec<Cell>]) -> Value {
    let data: Vec<Value> = rows
        .iter()
        .map(|row| Value::Array(row.iter().map(Cell::to_run_value).collect()))
        .collect();
    json!({ "columns": columns, "data": data })
}

fn write_run_file(path: &Path, columns: &[Column], rows: &[Vec<Cell>]) -> MediaResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &run_file_value(columns, rows))?;
    writer.flush()?;
    Ok(())
}

impl Media for Table {
    fn class_name(&self) -> &'static str {
        "Table"
    }

    fn bind_to_run(
        &mut self,
        run: &mut dyn Run,
        namespace: &[&str],
        name: Option<&str>,
    ) -> MediaResult<()> {
        let Self {
            core,
            columns,
            rows,
        } = self;
        core.materialize_with(TABLE_FORMAT, |path| write_run_file(path, columns, rows))?;
        core.register_with_run(run, namespace, name)?;
        Ok(())
    }

    fn bind_to_artifact(&mut self, artifact: &mut dyn Artifact) -> MediaResult<Descriptor> {
        let mut descriptor = self.core.artifact_descriptor(artifact)?;

        let mut data = Vec::with_capacity(self.rows.len());
        for row in &mut self.rows {
            let mut cells = Vec::with_capacity(row.len());
            for cell in row.iter_mut() {
                cells.push(cell.bind_to_artifact(artifact)?);
            }
            data.push(Value::Array(cells));
        }

        descriptor.insert("columns".into(), serde_json::to_value(&self.columns)?);
        descriptor.insert("ncols".into(), self.columns.len().into());
        descriptor.insert("data".into(), Value::Array(data));
        descriptor.insert("nrows".into(), self.rows.len().into());
        Ok(descriptor)
    }

    fn to_json(&self) -> MediaResult<Descriptor> {
        let mut descriptor = self.core.to_json()?;
        descriptor.insert("ncols".into(), self.columns.len().into());
        descriptor.insert("nrows".into(), self.rows.len().into());
        Ok(descriptor)
    }
}

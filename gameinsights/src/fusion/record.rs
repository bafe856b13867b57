//! Unified records, projections and tabular output

use crate::collector::state::BatchReport;
use crate::error::CollectorResult;
use crate::schema::{Field, FieldValue, APPID_COLUMN, RECAP};
use crate::types::{FetchError, SourceId};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;

static ABSENT: FieldValue = FieldValue::Absent;

/// Outcome for one identifier across its applicable sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Every applicable source succeeded
    Ok,
    /// Some sources failed
    Partial,
    /// No source succeeded
    Failed,
}

/// Lower-priority value that disagreed with the precedence winner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    pub field: Field,
    pub winner: SourceId,
    pub winner_value: String,
    pub source: SourceId,
    pub value: String,
    /// Normalized Levenshtein similarity of the two renderings (0.0-1.0)
    pub similarity: f64,
}

/// Merged record for one identifier
///
/// `values` always holds every canonical field.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedRecord {
    pub identifier: String,
    values: BTreeMap<Field, FieldValue>,
    /// Source each supplied field came from
    pub provenance: BTreeMap<Field, SourceId>,
    pub conflicts: Vec<FieldConflict>,
    pub status: RecordStatus,
    /// Failure per source, for sources that failed
    pub errors: BTreeMap<SourceId, FetchError>,
}

impl UnifiedRecord {
    /// Record with every field `Absent`
    pub fn absent(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            values: Field::all().map(|f| (f, FieldValue::Absent)).collect(),
            provenance: BTreeMap::new(),
            conflicts: Vec::new(),
            status: RecordStatus::Failed,
            errors: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        self.values.get(&field).unwrap_or(&ABSENT)
    }

    pub(crate) fn set(&mut self, field: Field, value: FieldValue, source: SourceId) {
        self.values.insert(field, value);
        self.provenance.insert(field, source);
    }

    /// Every canonical field in output order
    pub fn values(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }

    /// Number of fields some source supplied
    pub fn populated(&self) -> usize {
        self.values.values().filter(|v| !v.is_absent()).count()
    }

    /// Attach per-source outcome
    pub fn with_outcome(
        mut self,
        status: RecordStatus,
        errors: BTreeMap<SourceId, FetchError>,
    ) -> Self {
        self.status = status;
        self.errors = errors;
        self
    }

    /// Same record under a different identifier (duplicate request slots)
    pub(crate) fn renamed(&self, identifier: &str) -> Self {
        let mut copy = self.clone();
        copy.identifier = identifier.to_string();
        copy
    }

    fn cells(&self, fields: &[Field]) -> Vec<Value> {
        std::iter::once(Value::String(self.identifier.clone()))
            .chain(fields.iter().map(|f| self.get(*f).to_json()))
            .collect()
    }
}

/// Full-record JSON: `steam_appid` followed by every canonical field
impl Serialize for UnifiedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields: Vec<Field> = Field::all().collect();
        ProjectedRecord {
            record: self,
            fields: &fields,
        }
        .serialize(serializer)
    }
}

struct ProjectedRecord<'a> {
    record: &'a UnifiedRecord,
    fields: &'a [Field],
}

impl Serialize for ProjectedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(APPID_COLUMN, &self.record.identifier)?;
        for field in self.fields {
            map.serialize_entry(field.name(), self.record.get(*field))?;
        }
        map.end()
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Which fields a batch exposes (after `steam_appid`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Full,
    Recap,
    Fields(Vec<Field>),
}

impl Projection {
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Projection::Full => Field::all().collect(),
            Projection::Recap => RECAP.to_vec(),
            Projection::Fields(fields) => fields.clone(),
        }
    }

    pub fn columns(&self) -> Vec<String> {
        std::iter::once(APPID_COLUMN.to_string())
            .chain(self.fields().into_iter().map(|f| f.name().to_string()))
            .collect()
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Records in request order, plus the run report
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub records: Vec<UnifiedRecord>,
    pub projection: Projection,
    pub report: BatchReport,
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnifiedRecord> {
        self.records.iter()
    }

    /// Same records under another projection
    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// One row per record, values unchanged
    pub fn to_table(&self) -> Table {
        let fields = self.projection.fields();
        Table {
            columns: self.projection.columns(),
            rows: self.records.iter().map(|r| r.cells(&fields)).collect(),
        }
    }
}

/// JSON array of projected record objects
impl Serialize for RecordBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.projection.fields();
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in &self.records {
            seq.serialize_element(&ProjectedRecord {
                record,
                fields: &fields,
            })?;
        }
        seq.end()
    }
}

// ============================================================================
// Table
// ============================================================================

/// Column-major header plus row-major JSON cells
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Cell by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }

    /// Write CSV with a header row
    ///
    /// `null` renders as an empty cell; arrays and objects as compact JSON.
    pub fn write_csv<W: Write>(&self, writer: W) -> CollectorResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(csv_cell))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> CollectorResult<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::CollectorError::Output(e.to_string()))
    }

    /// Rows as JSON objects keyed by column
    pub fn to_json_records(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    Value::Object(
                        self.columns
                            .iter()
                            .cloned()
                            .zip(row.iter().cloned())
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

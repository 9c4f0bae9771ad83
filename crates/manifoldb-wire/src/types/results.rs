//! Result containers for queries and searches.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field_data::{Column, FieldData};
use super::schema::DataType;
use crate::error::{WireError, WireResult};

/// A primary key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimaryKey {
    /// An integer key.
    Int64(i64),
    /// A string key.
    VarChar(String),
}

impl PrimaryKey {
    /// The data type of the key.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Int64(_) => DataType::Int64,
            Self::VarChar(_) => DataType::VarChar,
        }
    }

    /// Render the key as a filter expression literal.
    ///
    /// Integers are unquoted. Strings are double-quoted with `"` and `\` escaped.
    ///
    /// ```
    /// use manifoldb_wire::types::PrimaryKey;
    ///
    /// assert_eq!(PrimaryKey::Int64(-4).to_filter_literal(), "-4");
    /// assert_eq!(PrimaryKey::VarChar("a\"b".into()).to_filter_literal(), r#""a\"b""#);
    /// ```
    #[must_use]
    pub fn to_filter_literal(&self) -> String {
        match self {
            Self::Int64(v) => v.to_string(),
            Self::VarChar(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
                out
            }
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::VarChar(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<&str> for PrimaryKey {
    fn from(v: &str) -> Self {
        Self::VarChar(v.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(v: String) -> Self {
        Self::VarChar(v)
    }
}

/// Primary key of one row of a column, if the column is a key type.
fn key_at(field: &FieldData, row: usize) -> Option<PrimaryKey> {
    match &field.column {
        Column::Int64(v) => v.get(row).map(|&k| PrimaryKey::Int64(k)),
        Column::VarChar(v) => v.get(row).map(|k| PrimaryKey::VarChar(k.clone())),
        _ => None,
    }
}

/// Columns of a query result plus the set of requested output names.
///
/// All columns hold the same number of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    fields: Vec<FieldData>,
    output_names: BTreeSet<String>,
}

impl QueryResults {
    /// Create a result set.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::RowCountMismatch`] if the columns differ in length.
    pub fn new<I, S>(fields: Vec<FieldData>, output_names: I) -> WireResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_row_counts(&fields)?;
        Ok(Self { fields, output_names: output_names.into_iter().map(Into::into).collect() })
    }

    /// An empty result with no columns and the same output names.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self { fields: Vec::new(), output_names: self.output_names.clone() }
    }

    /// The columns.
    #[must_use]
    pub fn fields(&self) -> &[FieldData] {
        &self.fields
    }

    /// Consume into the columns.
    #[must_use]
    pub fn into_fields(self) -> Vec<FieldData> {
        self.fields
    }

    /// Look up a column by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldData> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The requested output names.
    #[must_use]
    pub fn output_names(&self) -> &BTreeSet<String> {
        &self.output_names
    }

    /// Number of rows, taken from the first column.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.fields.first().map_or(0, FieldData::len)
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Copy rows `[from, min(to, rows))` of every column.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidRange`] for an empty or out-of-bounds range.
    pub fn slice(&self, from: usize, to: usize) -> WireResult<Self> {
        let fields = slice_fields(&self.fields, from, to)?;
        Ok(Self { fields, output_names: self.output_names.clone() })
    }

    /// Append the rows of `other`.
    ///
    /// An empty target (no columns) takes a copy of `other`. Otherwise every
    /// column of the target is extended with the same-named column of `other`;
    /// columns only present in `other` are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `other` lacks one of the target's columns or a type
    /// differs. The target is left unchanged on error.
    pub fn append(&mut self, other: &Self) -> WireResult<()> {
        append_fields(&mut self.fields, &other.fields)?;
        self.output_names.extend(other.output_names.iter().cloned());
        Ok(())
    }

    /// The primary key of every row, `None` if the column is missing or not a key type.
    #[must_use]
    pub fn primary_keys(&self, pk_name: &str) -> Option<Vec<PrimaryKey>> {
        let field = self.field(pk_name)?;
        (0..field.len()).map(|row| key_at(field, row)).collect()
    }

    /// The primary key of one row.
    #[must_use]
    pub fn primary_key_at(&self, pk_name: &str, row: usize) -> Option<PrimaryKey> {
        key_at(self.field(pk_name)?, row)
    }

    /// Render every row as a JSON object.
    ///
    /// Only requested output columns are included; with no requested names
    /// every column is included.
    #[must_use]
    pub fn rows(&self) -> Vec<Map<String, Value>> {
        render_rows(&self.fields, |name| {
            self.output_names.is_empty() || self.output_names.contains(name)
        })
    }
}

/// One page of search hits for a single target vector.
///
/// Carries the primary-key column name and the score column name; both
/// columns are present once any row exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleResult {
    pk_name: String,
    score_name: String,
    results: QueryResults,
}

impl SingleResult {
    /// Create a search result page.
    ///
    /// # Errors
    ///
    /// Returns an error if the columns differ in length, or if rows exist but
    /// the primary-key or score column is missing.
    pub fn new<I, S>(
        pk_name: impl Into<String>,
        score_name: impl Into<String>,
        fields: Vec<FieldData>,
        output_names: I,
    ) -> WireResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let result = Self {
            pk_name: pk_name.into(),
            score_name: score_name.into(),
            results: QueryResults::new(fields, output_names)?,
        };
        if result.row_count() > 0 {
            for required in [&result.pk_name, &result.score_name] {
                if result.results.field(required).is_none() {
                    return Err(WireError::invalid_value(format!(
                        "search result is missing column '{required}'"
                    )));
                }
            }
        }
        Ok(result)
    }

    /// An empty page carrying the same column names.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            pk_name: self.pk_name.clone(),
            score_name: self.score_name.clone(),
            results: QueryResults {
                fields: Vec::new(),
                output_names: self.results.output_names.clone(),
            },
        }
    }

    /// Name of the primary-key column.
    #[must_use]
    pub fn pk_name(&self) -> &str {
        &self.pk_name
    }

    /// Name of the score column.
    #[must_use]
    pub fn score_name(&self) -> &str {
        &self.score_name
    }

    /// The columns.
    #[must_use]
    pub fn fields(&self) -> &[FieldData] {
        self.results.fields()
    }

    /// Look up a column by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldData> {
        self.results.field(name)
    }

    /// The requested output names.
    #[must_use]
    pub fn output_names(&self) -> &BTreeSet<String> {
        self.results.output_names()
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.results.row_count()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The scores of every row.
    #[must_use]
    pub fn scores(&self) -> Option<&[f32]> {
        self.results.field(&self.score_name)?.as_float()
    }

    /// The primary keys of every row.
    #[must_use]
    pub fn primary_keys(&self) -> Option<Vec<PrimaryKey>> {
        self.results.primary_keys(&self.pk_name)
    }

    /// Copy a row range.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidRange`] for an empty or out-of-bounds range.
    pub fn slice(&self, from: usize, to: usize) -> WireResult<Self> {
        Ok(Self {
            pk_name: self.pk_name.clone(),
            score_name: self.score_name.clone(),
            results: self.results.slice(from, to)?,
        })
    }

    /// Append the rows of another page, see [`QueryResults::append`].
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or a type differs.
    pub fn append(&mut self, other: &Self) -> WireResult<()> {
        self.results.append(&other.results)
    }

    /// Render every row as a JSON object holding the requested outputs, the
    /// primary key and the score.
    #[must_use]
    pub fn rows(&self) -> Vec<Map<String, Value>> {
        render_rows(self.results.fields(), |name| {
            name == self.pk_name
                || name == self.score_name
                || self.results.output_names.contains(name)
        })
    }

    /// Consume into the underlying columns.
    #[must_use]
    pub fn into_results(self) -> QueryResults {
        self.results
    }
}

fn check_row_counts(fields: &[FieldData]) -> WireResult<()> {
    if let Some(first) = fields.first() {
        let expected = first.len();
        if let Some(bad) = fields.iter().find(|f| f.len() != expected) {
            return Err(WireError::RowCountMismatch {
                field: bad.name.clone(),
                expected,
                actual: bad.len(),
            });
        }
    }
    Ok(())
}

fn slice_fields(fields: &[FieldData], from: usize, to: usize) -> WireResult<Vec<FieldData>> {
    fields.iter().map(|f| f.slice(from, to)).collect()
}

fn append_fields(target: &mut Vec<FieldData>, source: &[FieldData]) -> WireResult<()> {
    if target.is_empty() {
        target.extend_from_slice(source);
        return Ok(());
    }

    // Validate everything before touching the target.
    let mut pairs = Vec::with_capacity(target.len());
    for (i, field) in target.iter().enumerate() {
        let Some(src) = source.iter().find(|s| s.name == field.name) else {
            return Err(WireError::invalid_value(format!(
                "appended rows are missing column '{}'",
                field.name
            )));
        };
        if field.data_type() != src.data_type() || field.element_type() != src.element_type() {
            return Err(WireError::TypeMismatch {
                field: field.name.clone(),
                expected: field.data_type(),
                actual: src.data_type(),
            });
        }
        pairs.push((i, src));
    }
    for (i, src) in pairs {
        target[i].append(src)?;
    }
    Ok(())
}

fn render_rows(fields: &[FieldData], include: impl Fn(&str) -> bool) -> Vec<Map<String, Value>> {
    let selected: Vec<&FieldData> = fields.iter().filter(|f| include(&f.name)).collect();
    let row_count = fields.first().map_or(0, FieldData::len);
    (0..row_count)
        .map(|row| {
            selected
                .iter()
                .map(|f| (f.name.clone(), f.value_at(row).unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(ids: Vec<i64>, scores: Vec<f32>) -> SingleResult {
        let tags: Vec<String> = ids.iter().map(|i| format!("t{i}")).collect();
        SingleResult::new(
            "id",
            "score",
            vec![
                FieldData::int64("id", ids),
                FieldData::float("score", scores),
                FieldData::varchar("tag", tags),
            ],
            ["tag"],
        )
        .expect("valid page")
    }

    #[test]
    fn test_filter_literal_escaping() {
        assert_eq!(PrimaryKey::Int64(12).to_filter_literal(), "12");
        assert_eq!(PrimaryKey::from("abc").to_filter_literal(), "\"abc\"");
        assert_eq!(PrimaryKey::from(r"a\b").to_filter_literal(), r#""a\\b""#);
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let err = QueryResults::new(
            vec![FieldData::int64("id", vec![1, 2]), FieldData::float("x", vec![1.0])],
            ["x"],
        );
        assert!(matches!(err, Err(WireError::RowCountMismatch { .. })));
    }

    #[test]
    fn test_search_page_requires_key_and_score() {
        let err = SingleResult::new(
            "id",
            "score",
            vec![FieldData::int64("id", vec![1])],
            Vec::<String>::new(),
        );
        assert!(err.is_err());

        let empty = SingleResult::new("id", "score", Vec::new(), Vec::<String>::new())
            .expect("empty page needs no columns");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_append_to_empty_clones() {
        let source = page(vec![1, 2], vec![0.1, 0.2]);
        let mut target = source.empty_like();
        target.append(&source).expect("append");
        assert_eq!(target, source);
    }

    #[test]
    fn test_append_ignores_extra_source_columns() {
        let mut target = QueryResults::new(vec![FieldData::int64("id", vec![1])], ["id"])
            .expect("valid");
        let source = QueryResults::new(
            vec![FieldData::float("extra", vec![0.5]), FieldData::int64("id", vec![2])],
            ["id"],
        )
        .expect("valid");
        target.append(&source).expect("append");
        assert_eq!(target.fields().len(), 1);
        assert_eq!(target.primary_keys("id"), Some(vec![1.into(), 2.into()]));
    }

    #[test]
    fn test_append_missing_column_leaves_target() {
        let mut target = page(vec![1], vec![0.1]);
        let source = QueryResults::new(vec![FieldData::int64("id", vec![2])], ["id"])
            .expect("valid");
        let source = SingleResult {
            pk_name: "id".into(),
            score_name: "score".into(),
            results: source,
        };
        assert!(target.append(&source).is_err());
        assert_eq!(target.row_count(), 1);
    }

    #[test]
    fn test_slice_and_keys() {
        let p = page(vec![5, 6, 7], vec![0.5, 0.6, 0.7]);
        let tail = p.slice(1, 3).expect("valid");
        assert_eq!(tail.primary_keys(), Some(vec![6.into(), 7.into()]));
        assert_eq!(tail.scores(), Some(&[0.6, 0.7][..]));
        assert_eq!(p.row_count(), 3);
    }

    #[test]
    fn test_rows_restricted_to_outputs() {
        let p = page(vec![1], vec![0.5]);
        let rows = p.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(Value::Object(rows[0].clone()), json!({"id": 1, "score": 0.5, "tag": "t1"}));

        let q = QueryResults::new(
            vec![FieldData::int64("id", vec![3]), FieldData::bool("hidden", vec![true])],
            ["id"],
        )
        .expect("valid");
        assert_eq!(Value::Object(q.rows()[0].clone()), json!({"id": 3}));
    }
}

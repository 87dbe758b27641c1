//! Tuples, schemas and field values.

use crate::error::{StorageError, StorageResult};
use crate::PageId;

/// The fixed-width column types a schema can carry.
///
/// `Str(n)` stores at most `n` bytes of UTF-8; on disk it occupies a
/// 4-byte big-endian length followed by `n` bytes, zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str(usize),
}

impl FieldType {
    /// The on-disk width of a value of this type, in bytes.
    pub fn width(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str(n) => 4 + n,
        }
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    /// Compares two fields of the same kind. Mixed-kind comparisons have
    /// no defined order and return `None`.
    pub fn compare(&self, other: &Field) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Some(a.cmp(b)),
            (Field::Str(a), Field::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn matches_type(&self, ty: &FieldType) -> bool {
        matches!(
            (self, ty),
            (Field::Int(_), FieldType::Int) | (Field::Str(_), FieldType::Str(_))
        )
    }

    fn write_to(&self, out: &mut Vec<u8>, ty: &FieldType) {
        match (self, ty) {
            (Field::Int(v), FieldType::Int) => out.extend_from_slice(&v.to_be_bytes()),
            (Field::Str(s), FieldType::Str(n)) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(*n);
                out.extend_from_slice(&(len as u32).to_be_bytes());
                out.extend_from_slice(&bytes[..len]);
                out.extend(std::iter::repeat(0u8).take(n - len));
            }
            _ => unreachable!("field/type mismatch is rejected at construction"),
        }
    }

    fn read_from(bytes: &[u8], ty: &FieldType) -> StorageResult<Field> {
        match ty {
            FieldType::Int => {
                let raw: [u8; 4] = bytes[..4]
                    .try_into()
                    .map_err(|_| StorageError::Db("truncated int field".to_string()))?;
                Ok(Field::Int(i32::from_be_bytes(raw)))
            }
            FieldType::Str(n) => {
                let raw: [u8; 4] = bytes[..4]
                    .try_into()
                    .map_err(|_| StorageError::Db("truncated string length".to_string()))?;
                let len = (u32::from_be_bytes(raw) as usize).min(*n);
                let data = &bytes[4..4 + len];
                Ok(Field::Str(String::from_utf8_lossy(data).into_owned()))
            }
        }
    }
}

/// One column of a schema: a type plus an optional name.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub field_type: FieldType,
    pub name: Option<String>,
}

/// An ordered sequence of fixed-width columns.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    /// A schema of unnamed columns.
    pub fn from_types(types: Vec<FieldType>) -> Schema {
        Schema {
            fields: types
                .into_iter()
                .map(|field_type| SchemaField {
                    field_type,
                    name: None,
                })
                .collect(),
        }
    }

    /// A schema of named columns.
    pub fn with_names(columns: Vec<(FieldType, &str)>) -> Schema {
        Schema {
            fields: columns
                .into_iter()
                .map(|(field_type, name)| SchemaField {
                    field_type,
                    name: Some(name.to_string()),
                })
                .collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, i: usize) -> Option<&FieldType> {
        self.fields.get(i).map(|f| &f.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.fields.get(i).and_then(|f| f.name.as_deref())
    }

    /// The index of the first column with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
    }

    /// The on-disk width of a tuple of this schema, in bytes.
    pub fn tuple_width(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.width()).sum()
    }

    /// Concatenates two schemas, left columns first.
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Schema { fields }
    }
}

// Two schemas are equal when their column types line up; names play no
// part in the on-disk layout, so they play no part in equality either.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for Schema {}

/// A reference to a tuple's on-disk home: its page plus its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// A row: one field per schema column, plus the record id of its slot
/// once it has been stored on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    schema: Schema,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(schema: Schema, fields: Vec<Field>) -> StorageResult<Tuple> {
        if fields.len() != schema.num_fields() {
            return Err(StorageError::Db(format!(
                "tuple has {} fields but schema has {}",
                fields.len(),
                schema.num_fields()
            )));
        }
        for (i, (field, schema_field)) in fields.iter().zip(&schema.fields).enumerate() {
            if !field.matches_type(&schema_field.field_type) {
                return Err(StorageError::Db(format!(
                    "field {i} does not match its schema type"
                )));
            }
        }
        Ok(Tuple {
            schema,
            fields,
            record_id: None,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Serializes the tuple into exactly `schema.tuple_width()` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.schema.tuple_width());
        for (field, schema_field) in self.fields.iter().zip(&self.schema.fields) {
            field.write_to(&mut out, &schema_field.field_type);
        }
        out
    }

    /// Parses a tuple from the first `schema.tuple_width()` bytes of `bytes`.
    pub fn parse(bytes: &[u8], schema: &Schema) -> StorageResult<Tuple> {
        if bytes.len() < schema.tuple_width() {
            return Err(StorageError::Db(format!(
                "tuple needs {} bytes, got {}",
                schema.tuple_width(),
                bytes.len()
            )));
        }
        let mut fields = Vec::with_capacity(schema.num_fields());
        let mut offset = 0;
        for schema_field in &schema.fields {
            let width = schema_field.field_type.width();
            fields.push(Field::read_from(
                &bytes[offset..offset + width],
                &schema_field.field_type,
            )?);
            offset += width;
        }
        Ok(Tuple {
            schema: schema.clone(),
            fields,
            record_id: None,
        })
    }
}

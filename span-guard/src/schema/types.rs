//! Declarative column type tree for table configurations.
//!
//! The declared tree is the *expected* shape of a table. It converts to
//! arrow types for comparison against the schema a bound session actually
//! reports.

use arrow::datatypes::{DataType, Field, Fields, TimeUnit};
use std::sync::Arc;

/// The type of a declared column or nested field.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Float64,
    /// Boolean
    Boolean,
    /// Calendar date
    Date,
    /// Timestamp; precision and timezone are backend details and are not
    /// declared here
    Timestamp,
    /// Fixed-point decimal
    Decimal {
        /// Total number of digits
        precision: u8,
        /// Digits after the decimal point
        scale: i8,
    },
    /// Nested record of named fields
    Record(Vec<ColumnDef>),
    /// Repeated list of a single element definition
    List(Box<ColumnDef>),
}

impl ColumnType {
    /// Returns true if this type is a repeated list.
    pub fn is_list(&self) -> bool {
        matches!(self, ColumnType::List(_))
    }

    /// Returns true if this type is a nested record.
    pub fn is_record(&self) -> bool {
        matches!(self, ColumnType::Record(_))
    }

    /// Looks up a direct child field of a record type.
    pub fn child(&self, name: &str) -> Option<&ColumnDef> {
        match self {
            ColumnType::Record(fields) => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    /// Returns the element definition of a list type.
    pub fn element(&self) -> Option<&ColumnDef> {
        match self {
            ColumnType::List(element) => Some(element),
            _ => None,
        }
    }

    fn to_arrow(&self) -> DataType {
        match self {
            ColumnType::String => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Date => DataType::Date32,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            ColumnType::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale),
            ColumnType::Record(fields) => {
                let arrow_fields: Vec<Field> =
                    fields.iter().map(|f| f.to_arrow_field()).collect();
                DataType::Struct(Fields::from(arrow_fields))
            }
            ColumnType::List(element) => DataType::List(Arc::new(element.to_arrow_field())),
        }
    }
}

/// A declared column or nested field: name, type, nullability.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Field name
    pub name: String,
    /// Field type
    pub column_type: ColumnType,
    /// Whether the field may be null. Below the top level this is
    /// advisory only: the comparison normalizes nested nullability away.
    pub nullable: bool,
}

impl ColumnDef {
    /// Creates a required (non-nullable) column definition.
    pub fn required(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
        }
    }

    /// Creates a nullable column definition.
    pub fn nullable(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }

    /// Converts the declaration to an arrow field.
    pub fn to_arrow_field(&self) -> Field {
        Field::new(&self.name, self.column_type.to_arrow(), self.nullable)
    }
}

//! Property tests for structural type comparison.

use arrow::datatypes::{DataType, Field, Fields, TimeUnit};
use proptest::prelude::*;
use span_guard::schema::{compare, TypeComparison};
use std::sync::Arc;

/// A generator-friendly mirror of the supported type shapes.
#[derive(Debug, Clone)]
enum TestType {
    Utf8,
    Int64,
    Float64,
    Boolean,
    Date,
    Timestamp,
    Struct(Vec<(String, TestType)>),
    List(Box<TestType>),
}

impl TestType {
    fn to_arrow(&self) -> DataType {
        match self {
            TestType::Utf8 => DataType::Utf8,
            TestType::Int64 => DataType::Int64,
            TestType::Float64 => DataType::Float64,
            TestType::Boolean => DataType::Boolean,
            TestType::Date => DataType::Date32,
            TestType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            TestType::Struct(fields) => DataType::Struct(Fields::from(
                fields
                    .iter()
                    .map(|(name, ty)| Field::new(name, ty.to_arrow(), true))
                    .collect::<Vec<_>>(),
            )),
            TestType::List(element) => {
                DataType::List(Arc::new(Field::new("item", element.to_arrow(), true)))
            }
        }
    }

    /// The same type with struct field order reversed, nested nullability
    /// tightened, and timestamp units/list element names varied: all
    /// differences normalization must erase.
    fn to_scrambled_arrow(&self) -> DataType {
        match self {
            TestType::Timestamp => DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
            TestType::Struct(fields) => DataType::Struct(Fields::from(
                fields
                    .iter()
                    .rev()
                    .map(|(name, ty)| Field::new(name, ty.to_scrambled_arrow(), false))
                    .collect::<Vec<_>>(),
            )),
            TestType::List(element) => DataType::List(Arc::new(Field::new(
                "element",
                element.to_scrambled_arrow(),
                false,
            ))),
            other => other.to_arrow(),
        }
    }
}

fn test_type_strategy() -> impl Strategy<Value = TestType> {
    let leaf = prop_oneof![
        Just(TestType::Utf8),
        Just(TestType::Int64),
        Just(TestType::Float64),
        Just(TestType::Boolean),
        Just(TestType::Date),
        Just(TestType::Timestamp),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|ty| TestType::List(Box::new(ty))),
            proptest::collection::vec(("f[a-d]", inner), 1..4).prop_map(|mut fields| {
                // Struct field names must be unique.
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                fields.dedup_by(|a, b| a.0 == b.0);
                TestType::Struct(
                    fields
                        .into_iter()
                        .enumerate()
                        .map(|(i, (name, ty))| (format!("{name}{i}"), ty))
                        .collect(),
                )
            }),
        ]
    })
}

proptest! {
    #[test]
    fn compare_is_reflexive(ty in test_type_strategy(), nullable in any::<bool>()) {
        let field = Field::new("column", ty.to_arrow(), nullable);
        let outcome = compare(&field, &field);
        prop_assert_eq!(outcome.comparison, TypeComparison::Match);
    }

    #[test]
    fn normalization_erases_irrelevant_differences(ty in test_type_strategy()) {
        // Same top-level nullability, scrambled nested representation.
        let expected = Field::new("column", ty.to_arrow(), true);
        let actual = Field::new("column", ty.to_scrambled_arrow(), true);
        let outcome = compare(&expected, &actual);
        prop_assert_eq!(outcome.comparison, TypeComparison::Match);
    }

    #[test]
    fn extra_struct_field_warns_never_fails(ty in test_type_strategy()) {
        let expected = Field::new(
            "column",
            DataType::Struct(Fields::from(vec![Field::new("a", ty.to_arrow(), true)])),
            true,
        );
        let actual = Field::new(
            "column",
            DataType::Struct(Fields::from(vec![
                Field::new("a", ty.to_arrow(), true),
                Field::new("zz_extra", DataType::Utf8, true),
            ])),
            true,
        );
        match compare(&expected, &actual).comparison {
            TypeComparison::Warn { reasons } => {
                prop_assert!(reasons.iter().any(|r| r.contains("zz_extra")));
            }
            other => prop_assert!(false, "expected warn, got {other:?}"),
        }
    }

    #[test]
    fn missing_expected_field_fails(ty in test_type_strategy()) {
        let expected = Field::new(
            "column",
            DataType::Struct(Fields::from(vec![
                Field::new("a", ty.to_arrow(), true),
                Field::new("required_extra", DataType::Utf8, true),
            ])),
            true,
        );
        let actual = Field::new(
            "column",
            DataType::Struct(Fields::from(vec![Field::new("a", ty.to_arrow(), true)])),
            true,
        );
        prop_assert!(compare(&expected, &actual).comparison.is_fail());
    }
}

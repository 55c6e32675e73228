//! Property-based testing utilities for quarry-core.
//!
//! This module provides strategies for the type model so that its JSON
//! round-trips and coercion rules can be checked with proptest.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::catalog::Catalog;
    use crate::types::{DataType, RecordType, Type, Value};

    // =========================================================================
    // Arbitrary Strategies for Value
    // =========================================================================

    /// Strategy for generating Value instances that roundtrip through JSON.
    /// Uses integer-representable floats to avoid JSON precision issues.
    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int64),
            any::<i32>().prop_map(|i| Value::Float64(f64::from(i))),
            ".*".prop_map(Value::String),
        ]
    }

    // =========================================================================
    // Arbitrary Strategies for types
    // =========================================================================

    fn arb_data_type() -> impl Strategy<Value = DataType> {
        prop_oneof![
            Just(DataType::Bool),
            Just(DataType::Int64),
            Just(DataType::Float64),
            Just(DataType::String),
        ]
    }

    /// Flat record types with unique labels.
    fn arb_row() -> impl Strategy<Value = RecordType> {
        prop::collection::btree_map("[A-Z][a-z]{0,8}", arb_data_type(), 0..5)
            .prop_map(RecordType::from_fields)
    }

    /// Arbitrary (possibly nested) types.
    fn arb_type() -> impl Strategy<Value = Type> {
        let leaf = arb_data_type().prop_map(Type::Base);
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                inner.clone().prop_map(Type::collection),
                (inner.clone(), inner.clone()).prop_map(|(p, r)| Type::function(p, r)),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|fields| Type::Record(RecordType::from_fields(fields))),
            ]
        })
    }

    // =========================================================================
    // Property Tests
    // =========================================================================

    proptest! {
        /// Test that Value serialization roundtrips correctly.
        #[test]
        fn value_serde_roundtrip(value in arb_value()) {
            let serialized = serde_json::to_string(&value).unwrap();
            let deserialized: Value = serde_json::from_str(&serialized).unwrap();
            prop_assert_eq!(value, deserialized);
        }

        /// Test that Type serialization roundtrips correctly.
        #[test]
        fn type_serde_roundtrip(ty in arb_type()) {
            let serialized = serde_json::to_string(&ty).unwrap();
            let deserialized: Type = serde_json::from_str(&serialized).unwrap();
            prop_assert_eq!(ty, deserialized);
        }

        /// Test that a catalog survives its own JSON form.
        #[test]
        fn catalog_json_roundtrip(
            rows in prop::collection::btree_map("[A-Z][a-z]{1,8}", arb_row(), 0..4)
        ) {
            let mut builder = Catalog::builder();
            for (name, row) in rows {
                builder = builder.register(name, row).unwrap();
            }
            let catalog = builder.build();

            let loaded = Catalog::from_json(&catalog.to_json().unwrap()).unwrap();
            prop_assert_eq!(loaded, catalog);
        }

        /// Test that type coercion is reflexive.
        #[test]
        fn type_coercion_reflexive(ty in arb_type()) {
            prop_assert!(ty.can_coerce_to(&ty));
        }

        /// Test that common_supertype is symmetric.
        #[test]
        fn data_type_common_supertype_symmetric(
            dt1 in arb_data_type(),
            dt2 in arb_data_type()
        ) {
            prop_assert_eq!(dt1.common_supertype(&dt2), dt2.common_supertype(&dt1));
        }

        /// Test that a value always conforms to its own data type.
        #[test]
        fn value_conforms_to_own_type(value in arb_value()) {
            prop_assert!(value.data_type().can_coerce_to(&value.data_type()));
            prop_assert!(!value.type_name().is_empty());
        }
    }
}

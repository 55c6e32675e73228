//! Conformance checks for values supplied by backends.

use common_error::{Location, QuarryError, QuarryResult};

use super::{DataType, RecordType, Type, Value};

/// Check that a value conforms to the expected base type.
pub fn check_type_invariants(
    value: &Value,
    expected: DataType,
    location: &Location,
) -> QuarryResult<()> {
    if value.data_type().can_coerce_to(&expected) {
        Ok(())
    } else {
        Err(QuarryError::type_error(
            expected.display_name(),
            value.type_name(),
            location.clone(),
        ))
    }
}

/// Check that a row of base values matches a flat record type, field by
/// field and in order.
pub fn check_row_invariants(
    row: &[(String, Value)],
    expected: &RecordType,
    location: &Location,
) -> QuarryResult<()> {
    if row.len() != expected.len() {
        return Err(QuarryError::type_error(
            format!("{} fields", expected.len()),
            format!("{} fields", row.len()),
            location.clone(),
        ));
    }

    for ((label, value), (expected_label, expected_ty)) in row.iter().zip(expected.fields()) {
        if label != expected_label {
            return Err(QuarryError::type_error(
                format!("field `{expected_label}`"),
                format!("field `{label}`"),
                location.clone(),
            ));
        }
        let Type::Base(dt) = expected_ty else {
            return Err(QuarryError::type_error(
                "a base-typed field",
                expected_ty.to_string(),
                location.field(label),
            ));
        };
        check_type_invariants(value, *dt, &location.field(label))?;
    }

    Ok(())
}

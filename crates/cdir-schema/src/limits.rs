use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Length bounds for names and descriptions, expressed as a minimum and the
/// distance to the maximum so that `min <= max` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLengthConstraint {
    pub min: u16,
    pub max_min_diff: u16,
}

impl InputLengthConstraint {
    pub const fn new(min: u16, max_min_diff: u16) -> Self {
        Self { min, max_min_diff }
    }

    /// Upper bound, saturating at `u16::MAX`.
    pub fn max(&self) -> u16 {
        self.min.saturating_add(self.max_min_diff)
    }

    /// Check `len` against the bounds, returning the matching error.
    pub fn ensure_valid(
        &self,
        len: usize,
        too_short: ValidationError,
        too_long: ValidationError,
    ) -> ValidationResult<()> {
        if len < self.min as usize {
            return Err(too_short);
        }
        if len > self.max() as usize {
            return Err(too_long);
        }
        Ok(())
    }
}

/// Directory-wide constants bounding the size of classes, schemas, and values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_number_of_classes: u64,
    pub max_number_of_maintainers_per_class: usize,
    pub max_number_of_curators_per_group: usize,
    pub max_number_of_schemas_per_class: usize,
    pub max_number_of_properties_per_class: usize,
    /// Upper bound for a class's `maximum_entities_count`.
    pub max_number_of_entities_per_class: u64,
    /// Upper bound for a per-controller creation voucher.
    pub individual_entities_creation_limit: u64,
    pub text_max_length_constraint: u16,
    pub hashed_text_max_length_constraint: Option<u16>,
    pub vec_max_length_constraint: u16,
    pub property_name_length: InputLengthConstraint,
    pub property_description_length: InputLengthConstraint,
    pub class_name_length: InputLengthConstraint,
    pub class_description_length: InputLengthConstraint,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_number_of_classes: 100,
            max_number_of_maintainers_per_class: 10,
            max_number_of_curators_per_group: 50,
            max_number_of_schemas_per_class: 20,
            max_number_of_properties_per_class: 40,
            max_number_of_entities_per_class: 400,
            individual_entities_creation_limit: 50,
            text_max_length_constraint: 5_000,
            hashed_text_max_length_constraint: Some(25_000),
            vec_max_length_constraint: 200,
            property_name_length: InputLengthConstraint::new(1, 49),
            property_description_length: InputLengthConstraint::new(0, 500),
            class_name_length: InputLengthConstraint::new(1, 49),
            class_description_length: InputLengthConstraint::new(0, 500),
        }
    }
}

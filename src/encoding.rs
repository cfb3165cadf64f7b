//! Field metadata for encoded tabular inputs
//!
//! An original record is a list of fields. Each field is expanded into one or more
//! encoded feature positions: a categorical field becomes a one-hot group, every
//! other field occupies a single position. The corrector uses the field types to
//! repair candidates, and [`FieldMetadata::vector_transform`] expands field-level
//! weights into feature-level weights.
use crate::error::{AttackError, Result};
use crate::AdvFloat;
use itertools::Itertools;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum FieldType {
    /// Mutually exclusive categories, exactly one position set
    OneHot,
    /// Integer `>= 1`
    PositiveInteger,
    /// Integer `>= 2`
    IntegerMoreOne,
    Integer,
    /// Real valued `>= 0`
    NonNegative,
    Continuous,
}

impl FieldType {
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::PositiveInteger | Self::IntegerMoreOne | Self::Integer
        )
    }

    /// Smallest valid value of a single-position field
    pub const fn floor(self) -> Option<AdvFloat> {
        match self {
            Self::PositiveInteger => Some(1.),
            Self::IntegerMoreOne => Some(2.),
            Self::NonNegative => Some(0.),
            Self::OneHot | Self::Integer | Self::Continuous => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub positions: Range<usize>,
    pub field_type: FieldType,
    /// Optional upper end of the field's domain, ignored for one-hot fields
    pub max: Option<AdvFloat>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, positions: Range<usize>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            positions,
            field_type,
            max: None,
        }
    }

    #[must_use]
    pub fn with_max(mut self, max: AdvFloat) -> Self {
        self.max = Some(max);
        self
    }

    pub fn width(&self) -> usize {
        self.positions.len()
    }
}

/// Validated mapping from fields to encoded feature positions.
///
/// Every encoded feature belongs to exactly one field.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FieldMetadata {
    fields: Vec<FieldSpec>,
    /// `owner[feature]` is the index of the field containing `feature`
    owner: Vec<usize>,
}

impl FieldMetadata {
    /// # Errors
    /// If the fields are not contiguous from position 0, overlap, are empty, or a
    /// non one-hot field spans more than one position, or a field's max leaves no
    /// valid value
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        if fields.is_empty() {
            return Err(AttackError::InvalidConfig(
                "field metadata needs at least one field".to_string(),
            ));
        }
        if let Some(first) = fields.first() {
            if first.positions.start != 0 {
                return Err(AttackError::InvalidConfig(format!(
                    "field `{}` starts at {} instead of 0",
                    first.name, first.positions.start
                )));
            }
        }
        if let Some((prev, next)) = fields
            .iter()
            .tuple_windows()
            .find(|(prev, next)| prev.positions.end != next.positions.start)
        {
            return Err(AttackError::InvalidConfig(format!(
                "field `{}` ends at {} but field `{}` starts at {}",
                prev.name, prev.positions.end, next.name, next.positions.start
            )));
        }
        for field in &fields {
            match (field.field_type, field.width()) {
                (_, 0) => {
                    return Err(AttackError::InvalidConfig(format!(
                        "field `{}` covers no features",
                        field.name
                    )))
                }
                (FieldType::OneHot, _) | (_, 1) => {}
                (ty, width) => {
                    return Err(AttackError::InvalidConfig(format!(
                        "{:?} field `{}` must span one feature, not {}",
                        ty, field.name, width
                    )))
                }
            }
            if let (Some(max), false) = (field.max, field.field_type == FieldType::OneHot) {
                let ceil = if field.field_type.is_integral() {
                    max.floor()
                } else {
                    max
                };
                let floor = field.field_type.floor().unwrap_or(AdvFloat::NEG_INFINITY);
                if ceil.is_nan() || ceil < floor {
                    return Err(AttackError::InvalidConfig(format!(
                        "field `{}` has max {} below the smallest valid {:?} value",
                        field.name, max, field.field_type
                    )));
                }
            }
        }
        let owner = fields
            .iter()
            .enumerate()
            .flat_map(|(idx, field)| field.positions.clone().map(move |_| idx))
            .collect();
        Ok(Self { fields, owner })
    }

    /// Builds metadata from the encoded width of each field, e.g. the category
    /// counts of a list of one-hot encoders. Fields are named by their index.
    ///
    /// # Errors
    /// If the two slices differ in length or the widths are invalid for the types
    pub fn from_widths(widths: &[usize], types: &[FieldType]) -> Result<Self> {
        if widths.len() != types.len() {
            return Err(AttackError::shape_mismatch(&[widths.len()], &[types.len()]));
        }
        let mut start = 0;
        let fields = widths
            .iter()
            .zip(types)
            .enumerate()
            .map(|(idx, (&width, &ty))| {
                let spec = FieldSpec::new(format!("field_{}", idx), start..start + width, ty);
                start += width;
                spec
            })
            .collect();
        Self::new(fields)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn nb_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn nb_features(&self) -> usize {
        self.owner.len()
    }

    /// Index of the field that owns encoded position `feature`
    pub fn field_of(&self, feature: usize) -> Option<usize> {
        self.owner.get(feature).copied()
    }

    /// Expands a field-level vector into a feature-level vector by repeating each
    /// field's value over all of its encoded positions.
    ///
    /// # Errors
    /// If `field_values` doesn't have one entry per field
    pub fn vector_transform(&self, field_values: &[AdvFloat]) -> Result<Array1<AdvFloat>> {
        if field_values.len() != self.nb_fields() {
            return Err(AttackError::shape_mismatch(
                &[self.nb_fields()],
                &[field_values.len()],
            ));
        }
        Ok(self.owner.iter().map(|&field| field_values[field]).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn credit_like() -> FieldMetadata {
        FieldMetadata::from_widths(
            &[3, 1, 2, 1],
            &[
                FieldType::OneHot,
                FieldType::PositiveInteger,
                FieldType::OneHot,
                FieldType::IntegerMoreOne,
            ],
        )
        .unwrap()
    }

    #[test]
    fn from_widths_assigns_contiguous_positions() {
        let meta = credit_like();
        assert_eq!(meta.nb_fields(), 4);
        assert_eq!(meta.nb_features(), 7);
        assert_eq!(meta.fields()[2].positions, 4..6);
        assert_eq!(meta.field_of(0), Some(0));
        assert_eq!(meta.field_of(3), Some(1));
        assert_eq!(meta.field_of(5), Some(2));
        assert_eq!(meta.field_of(6), Some(3));
        assert_eq!(meta.field_of(7), None);
    }

    #[test]
    fn vector_transform_repeats_over_groups() {
        let meta = credit_like();
        let expanded = meta.vector_transform(&[0.5, 1., 2., 0.]).unwrap();
        assert_eq!(expanded, array![0.5, 0.5, 0.5, 1., 2., 2., 0.]);
        assert!(meta.vector_transform(&[1., 2.]).is_err());
    }

    #[test]
    fn rejects_gaps_and_overlaps() {
        let gap = vec![
            FieldSpec::new("a", 0..2, FieldType::OneHot),
            FieldSpec::new("b", 3..4, FieldType::Integer),
        ];
        assert!(FieldMetadata::new(gap).is_err());
        let overlap = vec![
            FieldSpec::new("a", 0..2, FieldType::OneHot),
            FieldSpec::new("b", 1..3, FieldType::OneHot),
        ];
        assert!(FieldMetadata::new(overlap).is_err());
        let offset = vec![FieldSpec::new("a", 1..2, FieldType::Integer)];
        assert!(FieldMetadata::new(offset).is_err());
    }

    #[test]
    fn rejects_wide_scalar_fields() {
        assert!(FieldMetadata::from_widths(&[2], &[FieldType::Integer]).is_err());
        assert!(FieldMetadata::from_widths(&[0], &[FieldType::OneHot]).is_err());
        assert!(FieldMetadata::from_widths(&[1, 1], &[FieldType::OneHot]).is_err());
    }

    #[test]
    fn rejects_max_below_the_type_floor() {
        let field =
            |ty, max| FieldMetadata::new(vec![FieldSpec::new("f", 0..1, ty).with_max(max)]);
        assert!(field(FieldType::PositiveInteger, 0.5).is_err());
        assert!(field(FieldType::IntegerMoreOne, 1.9).is_err());
        assert!(field(FieldType::NonNegative, -0.1).is_err());
        assert!(field(FieldType::Continuous, AdvFloat::NAN).is_err());
        assert!(field(FieldType::PositiveInteger, 1.5).is_ok());
        assert!(field(FieldType::NonNegative, 0.).is_ok());
        assert!(field(FieldType::Integer, -4.).is_ok());
    }

    proptest! {
        #[test]
        fn every_feature_has_exactly_one_owner(meta in field_metadata(6)) {
            for feature in 0..meta.nb_features() {
                let owners = meta
                    .fields()
                    .iter()
                    .filter(|field| field.positions.contains(&feature))
                    .count();
                prop_assert_eq!(owners, 1);
            }
        }
    }
}

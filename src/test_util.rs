#![cfg(test)]
use crate::affine::Affine2;
use crate::bounds::Bounds1;
use crate::encoding::{FieldMetadata, FieldType};
use crate::AdvFloat;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use ndarray::Zip;
use proptest::arbitrary::functor::ArbitraryF1;
use proptest::prelude::*;
use proptest::sample::SizeRange;
use std::mem;

prop_compose! {
    pub fn array1(len: usize)(v in Vec::lift1_with(-10. .. 10., SizeRange::new(len..=len))) -> Array1<AdvFloat> {
        Array1::from_vec(v)
    }
}

prop_compose! {
    pub fn array2(rows: usize, cols: usize)(v in Vec::lift1_with(array1(cols), SizeRange::new(rows..=rows))) -> Array2<AdvFloat> {
        assert!(rows > 0);
        ndarray::stack(Axis(0), &v.iter().map(|x| x.view()).collect::<Vec<ArrayView1<AdvFloat>>>()).unwrap()
    }
}

prop_compose! {
    pub fn affine2(in_dim: usize, out_dim: usize)(basis in array2(out_dim, in_dim), shift in array1(out_dim)) -> Affine2 {
        Affine2::new(basis, shift).unwrap()
    }
}

prop_compose! {
    pub fn bounds1(len: usize)(mut lower in array1(len), mut upper in array1(len)) -> Bounds1 {
        Zip::from(&mut lower).and(&mut upper).for_each(|l, u| if *l > *u {mem::swap(l, u)});
        assert!(Zip::from(&lower).and(&upper).all(|l, u| l <= u));
        Bounds1::new(lower.view(), upper.view()).unwrap()
    }
}

pub fn field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![
        Just(FieldType::OneHot),
        Just(FieldType::PositiveInteger),
        Just(FieldType::IntegerMoreOne),
        Just(FieldType::Integer),
        Just(FieldType::NonNegative),
        Just(FieldType::Continuous),
    ]
}

prop_compose! {
    /// Up to `max_fields` fields; one-hot fields get a width in `1..=4`, the rest width 1
    pub fn field_metadata(max_fields: usize)(
        fields in Vec::lift1_with((field_type(), 1_usize..=4), SizeRange::new(1..=max_fields))
    ) -> FieldMetadata {
        let (widths, types): (Vec<usize>, Vec<FieldType>) = fields
            .into_iter()
            .map(|(ty, width)| if ty == FieldType::OneHot { (width, ty) } else { (1, ty) })
            .unzip();
        FieldMetadata::from_widths(&widths, &types).unwrap()
    }
}

prop_compose! {
    /// Metadata together with an arbitrary (uncorrected) feature vector of matching length
    pub fn metadata_and_vector(max_fields: usize)(meta in field_metadata(max_fields))(
        v in array1(meta.nb_features()), meta in Just(meta)
    ) -> (FieldMetadata, Array1<AdvFloat>) {
        (meta, v)
    }
}

use num_complex::Complex64;
use proptest::prelude::*;
use qmc_core::SingleProcess;
use qmc_meas::{CVecFix, CVecVar, Mode, RVecFix, RVecVar, Reduced};

fn mean_of(reduced: Reduced<qmc_meas::MeanVector>) -> Vec<f64> {
    reduced
        .into_present()
        .and_then(|mean| mean.real().map(<[f64]>::to_vec))
        .unwrap()
}

#[test]
fn kind_names_follow_scalar_and_policy() {
    assert_eq!(RVecFix::kind(), "rvecfix");
    assert_eq!(CVecFix::kind(), "cvecfix");
    assert_eq!(RVecVar::kind(), "rvecvar");
    assert_eq!(CVecVar::kind(), "cvecvar");
}

#[test]
fn fixed_mean_is_sum_over_count() {
    let mut acc = RVecFix::new();
    acc.add(&[1.0, 2.0], 1).unwrap();
    acc.add(&[3.0, 4.0], 1).unwrap();
    assert_eq!(acc.count(), 2);
    assert_eq!(acc.sum(), &[4.0, 6.0]);

    let mean = mean_of(acc.combine(&SingleProcess, 1.0, Mode::All, false).unwrap());
    assert_eq!(mean, vec![2.0, 3.0]);
}

#[test]
fn multiplicity_counts_draws_not_values() {
    let mut acc = RVecFix::new();
    acc.add(&[6.0], 3).unwrap();
    let mean = mean_of(acc.combine_all(&SingleProcess, 2.0, false).unwrap());
    assert!((mean[0] - 4.0).abs() < 1e-12);
}

#[test]
fn variable_length_pads_shorter_samples() {
    let mut acc = RVecVar::new();
    acc.add(&[1.0, 1.0, 1.0], 1).unwrap();
    acc.add(&[1.0, 1.0, 1.0, 1.0, 1.0], 1).unwrap();
    acc.add(&[1.0], 0).unwrap();
    assert_eq!(acc.sum(), &[3.0, 2.0, 2.0, 1.0, 1.0]);

    let mean = mean_of(acc.combine_all(&SingleProcess, 1.0, false).unwrap());
    assert_eq!(mean, vec![1.5, 1.0, 1.0, 0.5, 0.5]);
}

#[test]
fn fixed_length_rejects_other_sizes() {
    let mut acc = RVecFix::new();
    acc.add(&[1.0, 2.0, 3.0], 1).unwrap();
    let err = acc.add(&[1.0, 2.0], 1).unwrap_err();
    assert_eq!(err.code(), "shape-mismatch");
    assert_eq!(err.info().context.get("established").map(String::as_str), Some("3"));
    assert_eq!(err.info().context.get("incoming").map(String::as_str), Some("2"));
    assert_eq!(acc.sum(), &[1.0, 2.0, 3.0]);
    assert_eq!(acc.count(), 1);
}

#[test]
fn negative_multiplicity_is_rejected() {
    let mut acc = RVecVar::new();
    let err = acc.add(&[1.0], -1).unwrap_err();
    assert_eq!(err.code(), "negative-multiplicity");
    assert_eq!(acc.count(), 0);
    assert!(acc.sum().is_empty());
}

#[test]
fn empty_accumulator_cannot_be_reduced() {
    let acc = RVecFix::new();
    let err = acc.combine_all(&SingleProcess, 1.0, false).unwrap_err();
    assert_eq!(err.code(), "empty-measurement");
    assert_eq!(err.info().context.get("mode").map(String::as_str), Some("all"));

    let mut zero_weight = RVecFix::new();
    zero_weight.add(&[5.0], 0).unwrap();
    let err = zero_weight.combine_all(&SingleProcess, 1.0, false).unwrap_err();
    assert_eq!(err.code(), "empty-measurement");
}

#[test]
fn jackknife_on_a_single_process_has_nothing_left() {
    let mut acc = RVecFix::new();
    acc.add(&[1.0], 4).unwrap();
    let err = acc.combine_jackknife(&SingleProcess, 1.0, false).unwrap_err();
    assert_eq!(err.code(), "empty-measurement");
    assert_eq!(err.info().context.get("mode").map(String::as_str), Some("jackknife"));
}

#[test]
fn complex_means_scale_both_lanes() {
    let mut acc = CVecFix::new();
    acc.add(&[Complex64::new(1.0, 1.0), Complex64::new(0.0, -2.0)], 2).unwrap();
    let mean = acc
        .combine_all(&SingleProcess, 2.0, true)
        .unwrap()
        .into_present()
        .unwrap();
    assert!(mean.binary);
    assert_eq!(
        mean.complex().unwrap(),
        &[Complex64::new(1.0, 1.0), Complex64::new(0.0, -2.0)]
    );
}

proptest! {
    #[test]
    fn fixed_mean_matches_arithmetic_mean(
        samples in prop::collection::vec(prop::collection::vec(-1.0e3..1.0e3f64, 3), 1..24)
    ) {
        let mut acc = RVecFix::new();
        for sample in &samples {
            acc.add(sample, 1).unwrap();
        }
        let mean = mean_of(acc.combine_all(&SingleProcess, 1.0, false).unwrap());
        for (index, value) in mean.iter().enumerate() {
            let expected = samples.iter().map(|s| s[index]).sum::<f64>() / samples.len() as f64;
            prop_assert!((value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn variable_length_tracks_longest_sample(
        lengths in prop::collection::vec(0usize..12, 1..16)
    ) {
        let mut acc = RVecVar::new();
        for len in &lengths {
            acc.add(&vec![1.0; *len], 1).unwrap();
        }
        let longest = lengths.iter().copied().max().unwrap_or(0);
        prop_assert_eq!(acc.sum().len(), longest);
        for (index, value) in acc.sum().iter().enumerate() {
            let covering = lengths.iter().filter(|len| **len > index).count() as f64;
            prop_assert_eq!(*value, covering);
        }
    }
}

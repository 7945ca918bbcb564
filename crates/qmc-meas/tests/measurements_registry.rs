use num_complex::Complex64;
use qmc_core::{Communicator, ThreadGroup};
use qmc_meas::schema::{structure_hash, verify_structure};
use qmc_meas::{fix, var, Leaf, Measurements, Value};

#[test]
fn new_set_holds_only_the_partition() {
    let measurements = Measurements::new();
    assert_eq!(measurements.subspaces().collect::<Vec<_>>(), vec!["partition"]);
    let document = measurements.document().unwrap();
    assert_eq!(
        document.at(&["partition", "steps"]).and_then(Value::as_int),
        Some(0)
    );
}

#[test]
fn subspaces_are_created_on_first_use() {
    let mut measurements = Measurements::new();
    measurements
        .add("two_point", &["greens", "up"], var(vec![1.0, 2.0], 1))
        .unwrap();
    measurements
        .add("two_point", &["phase"], fix(Complex64::new(0.0, 1.0), 1))
        .unwrap();
    measurements.add_steps("two_point", 12).unwrap();
    measurements.add_steps("two_point", 3).unwrap();

    let worm = measurements.worm("two_point").unwrap();
    assert_eq!(worm.steps(), 15);
    assert_eq!(worm.observables().leaf_count(), 2);
    assert!(matches!(
        worm.observables().at(&["phase"]).and_then(Value::as_leaf),
        Some(Leaf::CVecFix(_))
    ));
    assert_eq!(
        measurements.subspaces().collect::<Vec<_>>(),
        vec!["partition", "two_point"]
    );

    let document = measurements.document().unwrap();
    assert_eq!(
        document.at(&["two_point", "steps"]).and_then(Value::as_int),
        Some(15)
    );
    assert_eq!(
        document.at(&["two_point", "greens", "up"]).map(Value::kind),
        Some("rvecvar")
    );
}

#[test]
fn reserved_names_cannot_hold_observables() {
    let mut measurements = Measurements::new();
    let err = measurements.add("worm", &["steps"], fix(1.0, 1)).unwrap_err();
    assert_eq!(err.code(), "reserved-key");
    assert_eq!(err.info().context.get("path").map(String::as_str), Some("worm/steps"));

    let err = measurements.add("partition", &["sign"], fix(1.0, 1)).unwrap_err();
    assert_eq!(err.code(), "reserved-key");

    measurements.add("worm", &["sign"], fix(1.0, 1)).unwrap();
}

#[test]
fn subspace_root_cannot_hold_a_sample() {
    let mut measurements = Measurements::new();
    let err = measurements.add("worm", &[], fix(1.0, 1)).unwrap_err();
    assert_eq!(err.code(), "empty-path");
    assert_eq!(err.info().context.get("path").map(String::as_str), Some("worm"));
    assert!(measurements.worm("worm").is_none());
    measurements.document().unwrap();
}

#[test]
fn producer_errors_carry_the_full_path() {
    let mut measurements = Measurements::new();
    measurements.add("worm", &["g"], fix(vec![1.0, 2.0], 1)).unwrap();

    let err = measurements.add("worm", &["g"], fix(vec![1.0], 1)).unwrap_err();
    assert_eq!(err.code(), "shape-mismatch");
    assert_eq!(err.info().context.get("path").map(String::as_str), Some("worm/g"));

    let err = measurements.add("worm", &["g", "inner"], fix(1.0, 1)).unwrap_err();
    assert_eq!(err.code(), "path-conflict");
    assert_eq!(err.info().context.get("path").map(String::as_str), Some("worm/g/inner"));

    let err = measurements.add("worm", &["g"], fix(vec![1.0, 2.0], -2)).unwrap_err();
    assert_eq!(err.code(), "negative-multiplicity");

    let err = measurements.add_steps("worm", -1).unwrap_err();
    assert_eq!(err.code(), "negative-steps");
}

#[test]
fn sign_lives_in_the_partition() {
    let mut measurements = Measurements::new();
    measurements.add_sign(1.0, 1).unwrap();
    measurements.add_sign(-1.0, 2).unwrap();
    let partition = measurements.worm("partition").unwrap();
    let Some(Leaf::RVecFix(sign)) = partition.observables().at(&["sign"]).and_then(Value::as_leaf)
    else {
        panic!("sign accumulator missing");
    };
    assert_eq!(sign.sum(), &[0.0]);
    assert_eq!(sign.count(), 3);
}

#[test]
fn structure_hash_ignores_contents_and_order() {
    let mut first = Value::object();
    first.record(&["a"], fix(vec![1.0, 2.0], 1)).unwrap();
    first.record(&["b"], var(vec![1.0], 1)).unwrap();
    first.insert("steps", Value::Int(4)).unwrap();

    let mut second = Value::object();
    second.insert("steps", Value::Int(99)).unwrap();
    second.record(&["b"], var(vec![5.0, 5.0, 5.0], 3)).unwrap();
    second.record(&["a"], fix(vec![7.0, 7.0], 2)).unwrap();

    assert_eq!(structure_hash(&first), structure_hash(&second));

    let mut third = first.clone();
    third.record(&["c"], fix(1.0, 1)).unwrap();
    assert_ne!(structure_hash(&first), structure_hash(&third));
}

#[test]
fn divergent_trees_fail_on_every_rank() {
    let outcomes = ThreadGroup::run(3, |comm| {
        let mut tree = Value::object();
        tree.record(&["shared"], fix(1.0, 1)).unwrap();
        if comm.rank() == 2 {
            tree.record(&["extra"], fix(1.0, 1)).unwrap();
        }
        verify_structure(&comm, &tree).map_err(|err| err.code().to_string())
    });
    for outcome in outcomes {
        assert_eq!(outcome.unwrap_err(), "structure-divergence");
    }
}

#[test]
fn isomorphic_trees_agree_on_the_hash() {
    let hashes = ThreadGroup::run(2, |comm| {
        let mut tree = Value::object();
        let len = 1 + comm.rank();
        tree.record(&["g"], var(vec![1.0; len], len as i64)).unwrap();
        verify_structure(&comm, &tree).unwrap()
    });
    assert_eq!(hashes[0], hashes[1]);
}

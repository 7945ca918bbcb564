use qmc_core::{Communicator, SingleProcess, ThreadGroup};
use qmc_meas::{
    fix, jackknife_error, jackknife_error_collective, reduce_snapshot, snapshot_hash, Measurements,
    Mode, ReductionConfig, Value, WeightTable,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(mode: Mode) -> ReductionConfig {
    ReductionConfig {
        mode,
        weights: WeightTable::new().with("partition", 1.0).with("worm", 2.0),
        ..ReductionConfig::default()
    }
}

fn measurements(scale: f64) -> Measurements {
    let mut measurements = Measurements::new();
    measurements.add_sign(4.0, 4).unwrap();
    measurements.add_steps("partition", 4).unwrap();
    measurements
        .add("worm", &["g"], fix(vec![scale, 2.0 * scale], 2))
        .unwrap();
    measurements.add_steps("worm", 8).unwrap();
    measurements
}

#[test]
fn snapshot_hash_is_deterministic() {
    init_tracing();
    let first = reduce_snapshot(&SingleProcess, &measurements(1.0), &config(Mode::All)).unwrap();
    let second = reduce_snapshot(&SingleProcess, &measurements(1.0), &config(Mode::All)).unwrap();
    assert_eq!(snapshot_hash(&first).unwrap(), snapshot_hash(&second).unwrap());
    assert_eq!(snapshot_hash(&first).unwrap().len(), 64);

    let other = reduce_snapshot(&SingleProcess, &measurements(3.0), &config(Mode::All)).unwrap();
    assert_ne!(snapshot_hash(&first).unwrap(), snapshot_hash(&other).unwrap());
    assert_eq!(first.provenance.structure_hash, other.provenance.structure_hash);
}

#[test]
fn snapshot_records_provenance_and_normalized_values() {
    let snapshot = reduce_snapshot(&SingleProcess, &measurements(1.0), &config(Mode::All)).unwrap();
    assert!(snapshot.reporting);
    assert_eq!(snapshot.provenance.mode, "all");
    assert_eq!(snapshot.provenance.ranks, 1);
    assert_eq!(snapshot.provenance.structure_hash.len(), 16);

    // sign 1, Z_partition = 4, Z_worm = 8 / 2 = 4
    let g = snapshot
        .document
        .at(&["worm", "g"])
        .and_then(Value::as_mean)
        .and_then(|mean| mean.real())
        .unwrap();
    assert!((g[0] - 0.5).abs() < 1e-12);
    assert!((g[1] - 1.0).abs() < 1e-12);

    let exported = snapshot.to_json().unwrap();
    assert_eq!(exported["provenance"]["mode"], "all");
    assert_eq!(exported["document"]["worm"]["steps"], 8);
}

#[test]
fn only_the_coordinator_reports_in_all_mode() {
    init_tracing();
    let snapshots = ThreadGroup::run(2, |comm| {
        let scale = (comm.rank() + 1) as f64;
        reduce_snapshot(&comm, &measurements(scale), &config(Mode::All)).unwrap()
    });
    assert!(snapshots[0].reporting);
    assert!(!snapshots[1].reporting);
    assert_eq!(snapshots[0].provenance.rank, 0);
    assert_eq!(snapshots[1].provenance.rank, 1);
    assert_eq!(
        snapshots[0].provenance.structure_hash,
        snapshots[1].provenance.structure_hash
    );
    assert_eq!(
        snapshots[1].document.at(&["worm", "g"]),
        Some(&Value::Absent)
    );
}

#[test]
fn divergent_producers_are_caught_before_reduction() {
    let codes = ThreadGroup::run(2, |comm| {
        let mut measurements = measurements(1.0);
        if comm.rank() == 1 {
            measurements.add("worm", &["extra"], fix(1.0, 1)).unwrap();
        }
        reduce_snapshot(&comm, &measurements, &config(Mode::Jackknife))
            .map(|_| ())
            .map_err(|err| err.code().to_string())
    });
    for outcome in codes {
        assert_eq!(outcome.unwrap_err(), "structure-divergence");
    }
}

#[test]
fn jackknife_snapshots_feed_error_bars() {
    let bars = ThreadGroup::run(3, |comm| {
        let scale = (comm.rank() + 1) as f64;
        let snapshot = reduce_snapshot(&comm, &measurements(scale), &config(Mode::Jackknife)).unwrap();
        assert!(snapshot.reporting);
        let g = snapshot
            .document
            .at(&["worm", "g"])
            .and_then(Value::as_mean)
            .and_then(|mean| mean.real())
            .map(<[f64]>::to_vec)
            .unwrap();
        jackknife_error_collective(&comm, &g).unwrap()
    });
    // delete-one estimates of the first component are 1.25, 1.0 and 0.75
    let expected = jackknife_error(&[1.25, 1.0, 0.75]).unwrap();
    for rank_bars in &bars {
        assert_eq!(rank_bars.len(), 2);
        assert!((rank_bars[0].mean - expected.mean).abs() < 1e-12);
        assert!((rank_bars[0].error - expected.error).abs() < 1e-12);
        assert!((rank_bars[1].mean - 2.0 * expected.mean).abs() < 1e-12);
    }
}

#[test]
fn error_bar_of_known_estimates() {
    assert!(jackknife_error(&[]).is_none());
    let bar = jackknife_error(&[1.0, 2.0, 3.0]).unwrap();
    assert!((bar.mean - 2.0).abs() < 1e-12);
    assert!((bar.error - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);

    let single = jackknife_error(&[5.0]).unwrap();
    assert_eq!(single.error, 0.0);
}

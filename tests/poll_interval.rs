use fragdag::{next_interval, PollTuning};

#[test]
fn slow_completions_grow_the_interval() {
    let tuning = PollTuning::default();

    // 10 scans before a completion: too eager, back off by 25%.
    assert_eq!(next_interval(&tuning, 10, 0.5), 0.625);
}

#[test]
fn quick_completions_shrink_the_interval() {
    let tuning = PollTuning::default();

    // One scan sufficed: poll more often, down by 25%.
    assert_eq!(next_interval(&tuning, 1, 0.5), 0.375);
}

#[test]
fn threshold_itself_still_shrinks() {
    let tuning = PollTuning::default();

    // Growth requires strictly more scans than the threshold.
    assert_eq!(
        next_interval(&tuning, tuning.scan_threshold, 0.5),
        0.5 * tuning.shrink
    );
}

#[test]
fn growth_is_capped_at_the_ceiling() {
    let tuning = PollTuning::default();

    assert_eq!(next_interval(&tuning, 100, 0.9), tuning.ceiling);
    assert_eq!(next_interval(&tuning, 100, tuning.ceiling), tuning.ceiling);
}

#[test]
fn shrinking_never_goes_below_the_floor() {
    let tuning = PollTuning::default();

    assert_eq!(
        next_interval(&tuning, 1, tuning.floor * 1.1),
        tuning.floor
    );
    assert_eq!(next_interval(&tuning, 1, tuning.floor), tuning.floor);
}

#[test]
fn repeated_application_stays_within_bounds() {
    let tuning = PollTuning::default();

    let mut interval = tuning.initial;
    for _ in 0..200 {
        interval = next_interval(&tuning, 1, interval);
        assert!(interval >= tuning.floor);
    }
    assert_eq!(interval, tuning.floor);

    for _ in 0..200 {
        interval = next_interval(&tuning, 100, interval);
        assert!(interval <= tuning.ceiling);
    }
    assert_eq!(interval, tuning.ceiling);
}

#[test]
fn custom_tuning_is_honored() {
    let tuning = PollTuning {
        scan_threshold: 2,
        floor: 0.01,
        ceiling: 4.0,
        grow: 2.0,
        shrink: 0.5,
        initial: 1.0,
    };

    assert_eq!(next_interval(&tuning, 3, 1.0), 2.0);
    assert_eq!(next_interval(&tuning, 3, 3.0), 4.0);
    assert_eq!(next_interval(&tuning, 2, 1.0), 0.5);
    assert_eq!(next_interval(&tuning, 1, 0.015), 0.01);
}

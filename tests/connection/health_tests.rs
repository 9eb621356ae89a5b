use monero_connection_manager::core::connection::{ResponseHistory, MIN_BETTER_RESPONSES};

fn history(samples_oldest_first: &[Option<u64>]) -> ResponseHistory {
    let mut history = ResponseHistory::new();
    for sample in samples_oldest_first {
        history.record(*sample);
    }
    history
}

#[test]
fn test_record_is_newest_first_and_capped() {
    let history = history(&[Some(1), Some(2), Some(3), Some(4), None]);

    assert_eq!(history.len(), MIN_BETTER_RESPONSES);
    let samples: Vec<_> = history.samples().collect();
    assert_eq!(samples, vec![None, Some(4), Some(3)]);
}

#[test]
fn test_consistently_better_requires_full_window() {
    let fast = history(&[Some(10), Some(12)]);
    let slow = history(&[Some(50), Some(48)]);
    assert!(!fast.is_consistently_better(&slow));

    let fast = history(&[Some(11), Some(12), Some(10)]);
    let slow = history(&[Some(52), Some(48), Some(50)]);
    assert!(fast.is_consistently_better(&slow));
    assert!(!slow.is_consistently_better(&fast));
}

#[test]
fn test_single_worse_sample_blocks() {
    let candidate = history(&[Some(10), Some(60), Some(10)]);
    let current = history(&[Some(50), Some(50), Some(50)]);
    assert!(!candidate.is_consistently_better(&current));
}

#[test]
fn test_equal_latency_is_not_better() {
    let a = history(&[Some(20), Some(20), Some(20)]);
    let b = history(&[Some(20), Some(20), Some(20)]);
    assert!(!a.is_consistently_better(&b));
}

#[test]
fn test_missing_samples_never_better() {
    let candidate_failed = history(&[Some(10), None, Some(10)]);
    let current = history(&[Some(50), Some(50), Some(50)]);
    assert!(!candidate_failed.is_consistently_better(&current));

    let candidate = history(&[Some(10), Some(10), Some(10)]);
    let current_failed = history(&[Some(50), None, Some(50)]);
    assert!(!candidate.is_consistently_better(&current_failed));
}

#[test]
fn test_only_most_recent_window_counts() {
    // An old bad sample falls out of the window
    let candidate = history(&[Some(90), Some(10), Some(10), Some(10)]);
    let current = history(&[Some(50), Some(50), Some(50), Some(50)]);
    assert!(candidate.is_consistently_better(&current));
}

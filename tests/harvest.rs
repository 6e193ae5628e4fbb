use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;

use factmine::harvest::{AMI_REGEX, RetryPolicy, harvest};

const RESULTS: &str =
    r#"<results><result pre="the " value0="gene" post=" expression"/></results>"#;

#[test]
fn harvest_waits_out_a_late_results_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("results.xml")).unwrap();

    let writer_path = path.clone();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(120));
        std::fs::write(writer_path.as_std_path(), RESULTS).unwrap();
    });

    let policy = RetryPolicy {
        attempts: 4,
        delay: Duration::from_millis(80),
    };
    let outcome = harvest(&path, &AMI_REGEX, policy);
    writer.join().unwrap();

    assert!(!outcome.failed);
    assert_eq!(outcome.facts.len(), 1);
    assert_eq!(outcome.facts[0].fact, "gene");
}

#[test]
fn harvest_gives_up_after_exact_attempt_budget() {
    let path = Utf8PathBuf::from("/nonexistent/results.xml");
    let policy = RetryPolicy {
        attempts: 4,
        delay: Duration::from_millis(50),
    };

    let started = Instant::now();
    let outcome = harvest(&path, &AMI_REGEX, policy);
    let elapsed = started.elapsed();

    assert!(outcome.failed);
    assert!(outcome.facts.is_empty());
    // Three sleeps between four attempts, and no sleep after the last one.
    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < Duration::from_millis(400));
}

#[test]
fn malformed_xml_counts_as_transient_until_exhaustion() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("results.xml")).unwrap();
    std::fs::write(path.as_std_path(), "<results><result").unwrap();

    let policy = RetryPolicy {
        attempts: 2,
        delay: Duration::from_millis(10),
    };
    let outcome = harvest(&path, &AMI_REGEX, policy);

    assert!(outcome.failed);
    assert!(outcome.facts.is_empty());
}

#[test]
fn empty_result_set_is_success_not_failure() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("results.xml")).unwrap();
    std::fs::write(path.as_std_path(), "<results/>").unwrap();

    let policy = RetryPolicy {
        attempts: 4,
        delay: Duration::from_millis(10),
    };
    let outcome = harvest(&path, &AMI_REGEX, policy);

    assert!(!outcome.failed);
    assert!(outcome.facts.is_empty());
}

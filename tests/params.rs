use factmine::params::{Params, canonical_flag};

#[test]
fn to_args_keeps_caller_order_and_skips_managed_flags() {
    let params: Params = [
        ("url", "http://example.org/a"),
        ("o", "/tmp/out"),
        ("ratelimit", "5"),
    ]
    .into_iter()
    .collect();

    let args = params.to_args(&["-o", "--output"]);
    assert_eq!(
        args,
        vec!["--url", "http://example.org/a", "--ratelimit", "5"]
    );
}

#[test]
fn short_and_long_spellings_share_a_lookup() {
    let params: Params = [("--url", "http://example.org/a")].into_iter().collect();
    assert_eq!(
        params.get_any(&["u", "-u", "url", "--url"]),
        Some("http://example.org/a")
    );
}

#[test]
fn insert_replaces_in_place() {
    let mut params: Params = [("a", "1"), ("b", "2")].into_iter().collect();
    params.insert("a", "9");
    assert_eq!(params.to_args(&[]), vec!["-a", "9", "-b", "2"]);
}

#[test]
fn dashes_do_not_double_up() {
    assert_eq!(canonical_flag("---url"), "--url");
    assert_eq!(canonical_flag("--u"), "-u");
}

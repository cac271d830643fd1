use super::*;

#[test]
fn only_nonzero_counts_guarantee() {
    assert!(ErrorGuaranteed::from_error_count(0).is_none());
    assert!(ErrorGuaranteed::from_error_count(3).is_some());
}

#[test]
fn display() {
    assert_eq!(ErrorGuaranteed::new().to_string(), "error(s) emitted");
}

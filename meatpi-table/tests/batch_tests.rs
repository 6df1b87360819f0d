use meatpi_table::batch::{chunk_sizes, validate_partition};
use meatpi_table::{MAX_BATCH_SIZE, TableRow};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn exact_multiple_has_no_empty_tail() {
    assert_eq!(chunk_sizes(2 * MAX_BATCH_SIZE), vec![MAX_BATCH_SIZE, MAX_BATCH_SIZE]);
    assert!(chunk_sizes(0).is_empty());
}

proptest! {
    #[test]
    fn chunks_cover_input_within_limit(len in 0usize..1000) {
        let sizes = chunk_sizes(len);
        prop_assert_eq!(sizes.iter().sum::<usize>(), len);
        prop_assert!(sizes.iter().all(|s| *s > 0 && *s <= MAX_BATCH_SIZE));
        prop_assert_eq!(sizes.len(), len.div_ceil(MAX_BATCH_SIZE));
    }

    #[test]
    fn shared_partition_always_validates(rows in prop::collection::vec("[a-z]{1,6}", 0..40)) {
        let rows: Vec<TableRow> = rows.iter().map(|r| TableRow::new("pi-1", r.as_str())).collect();
        prop_assert!(validate_partition(&rows).is_ok());
    }
}

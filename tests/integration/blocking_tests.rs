//! Blocking facade tests

use std::sync::Arc;
use std::thread;

use dataverse_semantic::metadata::{BlockingAdapter, SdkAdapter};
use dataverse_semantic::DataverseError;

use crate::common::{sales_service, sales_web_adapter, solution_id};

#[test]
fn test_blocking_calls_from_plain_thread() {
    let handle = thread::spawn(|| {
        let adapter = BlockingAdapter::new(sales_web_adapter()).unwrap();
        let solution = adapter.find_solution("Sales").unwrap();
        let tables = adapter.list_solution_tables(solution.id).unwrap();
        let forms = adapter.list_forms(&tables[0].logical_name, true).unwrap();
        (solution.id, tables.len(), forms.len())
    });
    let (id, tables, forms) = handle.join().unwrap();
    assert_eq!(id, solution_id());
    assert_eq!(tables, 3);
    assert_eq!(forms, 1);
}

#[test]
fn test_cancellation_from_another_thread() {
    let adapter =
        BlockingAdapter::new(SdkAdapter::new(Arc::new(sales_service())).unwrap()).unwrap();
    let token = adapter.cancellation_token();

    thread::spawn(move || token.cancel()).join().unwrap();

    assert!(matches!(
        adapter.list_solutions(),
        Err(DataverseError::Cancelled)
    ));
    assert!(matches!(
        adapter.get_table_metadata("account"),
        Err(DataverseError::Cancelled)
    ));
}

#[test]
fn test_calls_resume_after_reset() {
    let adapter =
        BlockingAdapter::new(SdkAdapter::new(Arc::new(sales_service())).unwrap()).unwrap();
    let stale = adapter.cancellation_token();
    stale.cancel();
    assert!(matches!(
        adapter.list_solutions(),
        Err(DataverseError::Cancelled)
    ));

    let fresh = adapter.reset_cancellation();
    assert!(!fresh.is_cancelled());
    let solutions = adapter.list_solutions().unwrap();
    assert!(solutions.iter().any(|s| s.id == solution_id()));

    // Cancelling the old token again has no effect on the new one
    stale.cancel();
    assert!(adapter.get_table_metadata("account").is_ok());

    adapter.cancellation_token().cancel();
    assert!(matches!(
        adapter.get_table_metadata("account"),
        Err(DataverseError::Cancelled)
    ));
}

#[test]
fn test_into_inner_returns_adapter() {
    let adapter = BlockingAdapter::new(sales_web_adapter()).unwrap();
    let inner = adapter.into_inner();
    assert_eq!(inner.environment_url(), crate::common::ENVIRONMENT_URL);
}

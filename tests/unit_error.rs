/// Unit tests for DiError display and helpers
use ferrous_injector::{DiError, DiResult, ServiceNode};
use std::error::Error;
use std::sync::Arc;

#[test]
fn test_error_display_not_found() {
    let error = DiError::ServiceNotFound {
        service: "mailer".to_string(),
        scope: "api".to_string(),
        available: vec!["db".to_string(), "cache".to_string()],
    };
    assert_eq!(
        error.to_string(),
        "could not find service `mailer` from scope `api`, available services: `db`, `cache`"
    );

    let empty = DiError::ServiceNotFound {
        service: "mailer".to_string(),
        scope: "api".to_string(),
        available: Vec::new(),
    };
    assert!(empty.to_string().ends_with("available services: none"));
}

#[test]
fn test_error_display_cycle() {
    let a = ServiceNode::new("1", "[root]", "a");
    let b = ServiceNode::new("2", "worker", "b");
    let error = DiError::CycleDetected(vec![a.clone(), b, a]);
    assert_eq!(
        error.to_string(),
        "circular dependency detected: [root]/a -> worker/b -> [root]/a"
    );
}

#[test]
fn test_error_display_type_mismatch() {
    let error = DiError::TypeMismatch {
        service: "port".to_string(),
        expected: "u32",
        actual: "u16",
    };
    assert_eq!(error.to_string(), "service `port` is a `u16`, not a `u32`");
}

#[test]
fn test_service_error_is_the_source() {
    let cause: Arc<dyn Error + Send + Sync> = Arc::from(Box::<dyn Error + Send + Sync>::from("disk full"));
    let error = DiError::Shutdown {
        service: "db".to_string(),
        source: cause,
    };

    assert_eq!(error.to_string(), "shutdown of `db` failed: disk full");
    assert_eq!(error.source().map(ToString::to_string), Some("disk full".to_string()));
    assert_eq!(error.service_error().map(ToString::to_string), Some("disk full".to_string()));
    assert!(!error.is_deadline_exceeded());
}

#[test]
fn test_deadline_errors() {
    let error = DiError::DeadlineExceeded { service: "slow".to_string() };
    assert!(error.is_deadline_exceeded());
    assert!(error.service_error().is_none());
    assert_eq!(error.to_string(), "deadline exceeded while calling `slow`");

    let canceled = DiError::Canceled { service: "slow".to_string() };
    assert!(!canceled.is_deadline_exceeded());
}

#[test]
fn test_di_result_alias() {
    fn lookup(found: bool) -> DiResult<u8> {
        if found {
            Ok(1)
        } else {
            Err(DiError::InjectorShutDown("[root]".to_string()))
        }
    }

    assert_eq!(lookup(true).unwrap(), 1);
    assert_eq!(lookup(false).unwrap_err().to_string(), "injector `[root]` has been shut down");
}

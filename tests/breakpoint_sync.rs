//! Breakpoint authoring, per-session verification overlays, and the
//! service's push discipline, observed through the mock adapter request log.


use dapcore::model::breakpoint::BreakpointSpec;
use dapcore::protocol::events::{AdapterEvent, BreakpointEventReason};
use dapcore::protocol::{self, Capabilities};
use dapcore::service::DebugService;
use dapcore::session::{RequestKind, SessionConfiguration};
use mock_adapter::MockAdapter;
use std::path::Path;

fn launch_config() -> SessionConfiguration {
    let mut config = SessionConfiguration::new("debug test", "mock", RequestKind::Launch);
    config.program = Some("target/debug/app".to_string());
    config
}

#[test]
fn test_send_all_breakpoints_uses_fixed_kind_order() {
    let mut service = DebugService::new();
    service
        .add_breakpoints(
            Path::new("src/main.x"),
            vec![BreakpointSpec::at_line(10)],
            None,
        )
        .unwrap();
    service.model_mut().add_function_breakpoint("main");
    service
        .model_mut()
        .add_data_breakpoint("watch x", "data:x", false, None);
    service
        .model_mut()
        .add_instruction_breakpoint("0x1000", None, None, None);

    let mut adapter = MockAdapter::new();
    adapter.capabilities.exception_breakpoint_filters =
        vec![protocol::ExceptionBreakpointsFilter {
            filter: "raised".to_string(),
            label: "Raised Exceptions".to_string(),
            ..Default::default()
        }];
    let log = adapter.log.clone();

    service
        .start_session(launch_config(), Box::new(adapter))
        .unwrap();

    let log = log.lock().unwrap();
    let kinds: Vec<&str> = log
        .iter()
        .filter(|line| line.starts_with("set"))
        .map(|line| line.split(' ').next().unwrap())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "setBreakpoints",
            "setFunctionBreakpoints",
            "setExceptionBreakpoints",
            "setDataBreakpoints",
            "setInstructionBreakpoints",
        ]
    );
}

#[test]
fn test_author_attach_verify_detach_roundtrip() {
    let mut service = DebugService::new();
    let created = service
        .add_breakpoints(
            Path::new("main.x"),
            vec![BreakpointSpec::at_line(10)],
            None,
        )
        .unwrap();
    assert_eq!(created.len(), 1);
    assert!(created[0].verified());
    assert_eq!(created[0].line(), 10);

    // the attaching session rejects the location at first
    let mut adapter = MockAdapter::new();
    adapter.breakpoint_replies.push_back(Some(vec![protocol::Breakpoint {
        id: Some(7),
        verified: false,
        ..Default::default()
    }]));
    let session = service
        .start_session(launch_config(), Box::new(adapter))
        .unwrap();
    assert!(!service.model().breakpoints()[0].verified());

    // the adapter re-validates later and moves the breakpoint to line 12
    service
        .dispatch_event(
            session,
            AdapterEvent::Breakpoint {
                reason: BreakpointEventReason::Changed,
                breakpoint: protocol::Breakpoint {
                    id: Some(7),
                    verified: true,
                    line: Some(12),
                    ..Default::default()
                },
            },
        )
        .unwrap();
    let bp = &service.model().breakpoints()[0];
    assert!(bp.verified());
    assert_eq!(bp.line(), 12);

    // detach restores the authored view
    service.stop_session(session, true).unwrap();
    let bp = &service.model().breakpoints()[0];
    assert!(bp.verified());
    assert_eq!(bp.line(), 10);
    assert!(bp.message().is_none());
}

#[test]
fn test_detach_leaves_other_sessions_overlay_alone() {
    let mut service = DebugService::new();
    service
        .add_breakpoints(Path::new("main.x"), vec![BreakpointSpec::at_line(3)], None)
        .unwrap();

    let mut first = MockAdapter::new();
    first.breakpoint_replies.push_back(Some(vec![protocol::Breakpoint {
        id: Some(1),
        verified: false,
        ..Default::default()
    }]));
    let first_id = service
        .start_session(launch_config(), Box::new(first))
        .unwrap();
    let second_id = service
        .start_session(launch_config(), Box::new(MockAdapter::new()))
        .unwrap();

    let bp = &service.model().breakpoints()[0];
    assert_eq!(bp.sessions_that_verified(), vec![second_id]);
    assert!(bp.session_data(first_id).is_some());

    service.stop_session(first_id, false).unwrap();
    let bp = &service.model().breakpoints()[0];
    assert!(bp.session_data(first_id).is_none());
    assert_eq!(bp.sessions_that_verified(), vec![second_id]);
    assert!(bp.verified());
}

#[test]
fn test_resend_recomputes_supported_subset() {
    let mut service = DebugService::new();
    let mut conditional = BreakpointSpec::at_line(5);
    conditional.condition = Some("x > 0".to_string());
    service
        .add_breakpoints(Path::new("main.x"), vec![conditional], None)
        .unwrap();

    // adapter without conditional-breakpoint support
    let mut adapter = MockAdapter::new();
    adapter.capabilities = Capabilities::default();
    let log = adapter.log.clone();
    service
        .start_session(launch_config(), Box::new(adapter))
        .unwrap();

    // nothing was known about the session before the first push
    assert!(log
        .lock()
        .unwrap()
        .iter()
        .any(|line| line == "setBreakpoints main.x [5]"));

    // the overlay now records the missing capability; the next push of that
    // source must drop the conditional breakpoint
    service
        .add_breakpoints(Path::new("main.x"), vec![BreakpointSpec::at_line(9)], None)
        .unwrap();
    let log = log.lock().unwrap();
    let last_push = log
        .iter()
        .filter(|line| line.starts_with("setBreakpoints"))
        .next_back()
        .unwrap();
    assert_eq!(last_push, "setBreakpoints main.x [9]");
}

#[test]
fn test_add_breakpoints_targets_one_session_or_broadcasts() {
    let mut service = DebugService::new();
    let first = MockAdapter::new();
    let first_log = first.log.clone();
    let first_id = service
        .start_session(launch_config(), Box::new(first))
        .unwrap();
    let second = MockAdapter::new();
    let second_log = second.log.clone();
    service
        .start_session(launch_config(), Box::new(second))
        .unwrap();

    let sent_to = |log: &mock_adapter::RequestLog| {
        log.lock()
            .unwrap()
            .iter()
            .filter(|line| line.starts_with("setBreakpoints lib.x"))
            .count()
    };

    service
        .add_breakpoints(
            Path::new("lib.x"),
            vec![BreakpointSpec::at_line(1)],
            Some(first_id),
        )
        .unwrap();
    assert_eq!(sent_to(&first_log), 1);
    assert_eq!(sent_to(&second_log), 0);

    service
        .add_breakpoints(Path::new("lib.x"), vec![BreakpointSpec::at_line(2)], None)
        .unwrap();
    assert_eq!(sent_to(&first_log), 2);
    assert_eq!(sent_to(&second_log), 1);
}

#[test]
fn test_deactivating_breakpoints_pushes_empty_sets() {
    let mut service = DebugService::new();
    service
        .add_breakpoints(
            Path::new("main.x"),
            vec![BreakpointSpec::at_line(5)],
            None,
        )
        .unwrap();
    let adapter = MockAdapter::new();
    let log = adapter.log.clone();
    service
        .start_session(launch_config(), Box::new(adapter))
        .unwrap();

    service.set_breakpoints_activated(false).unwrap();
    {
        let log = log.lock().unwrap();
        let last_push = log
            .iter()
            .filter(|line| line.starts_with("setBreakpoints"))
            .next_back()
            .unwrap();
        assert_eq!(last_push, "setBreakpoints main.x []");
    }

    service.set_breakpoints_activated(true).unwrap();
    let log = log.lock().unwrap();
    let last_push = log
        .iter()
        .filter(|line| line.starts_with("setBreakpoints"))
        .next_back()
        .unwrap();
    assert_eq!(last_push, "setBreakpoints main.x [5]");
}

#[test]
fn test_removing_breakpoints_clears_the_adapter_table() {
    let mut service = DebugService::new();
    let created = service
        .add_breakpoints(
            Path::new("main.x"),
            vec![BreakpointSpec::at_line(5)],
            None,
        )
        .unwrap();
    let id = created[0].id();

    let adapter = MockAdapter::new();
    let log = adapter.log.clone();
    service
        .start_session(launch_config(), Box::new(adapter))
        .unwrap();

    service.remove_breakpoints(&[id]).unwrap();
    assert!(service.model().breakpoints().is_empty());
    let log = log.lock().unwrap();
    let last_push = log
        .iter()
        .filter(|line| line.starts_with("setBreakpoints"))
        .next_back()
        .unwrap();
    assert_eq!(last_push, "setBreakpoints main.x []");
}

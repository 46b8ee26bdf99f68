//! Incremental call-stack fetching, scope memoization and source
//! resolution, driven through a session with a scripted adapter.


use dapcore::protocol::events::AdapterEvent;
use dapcore::protocol::{self, StoppedDetails};
use dapcore::session::{RequestKind, Session, SessionConfiguration};
use mock_adapter::{frame, MockAdapter, RequestLog};
use std::rc::Rc;

fn launch_config() -> SessionConfiguration {
    let mut config = SessionConfiguration::new("debug test", "mock", RequestKind::Launch);
    config.program = Some("target/debug/app".to_string());
    config
}

fn stopped(thread_id: i64) -> AdapterEvent {
    AdapterEvent::Stopped(StoppedDetails {
        reason: "breakpoint".to_string(),
        thread_id: Some(thread_id),
        ..Default::default()
    })
}

/// Session stopped on thread 1 with `depth` frames available server-side.
fn stopped_session(depth: i64) -> (Session, RequestLog) {
    let mut adapter = MockAdapter::new();
    adapter.stacks.insert(
        1,
        (0..depth)
            .map(|id| frame(id, &format!("fn_{id}"), id + 1))
            .collect(),
    );
    adapter.scopes = vec![
        protocol::Scope {
            name: "Locals".to_string(),
            variables_reference: 10,
            expensive: false,
            named_variables: None,
            indexed_variables: None,
            line: None,
            column: None,
            end_line: None,
            end_column: None,
        },
        protocol::Scope {
            name: "Locals".to_string(),
            variables_reference: 11,
            expensive: false,
            named_variables: None,
            indexed_variables: None,
            line: None,
            column: None,
            end_line: None,
            end_column: None,
        },
        protocol::Scope {
            name: "Registers".to_string(),
            variables_reference: 12,
            expensive: true,
            named_variables: None,
            indexed_variables: None,
            line: None,
            column: None,
            end_line: None,
            end_column: None,
        },
    ];
    let log = adapter.log.clone();

    let mut session = Session::new(launch_config(), Box::new(adapter));
    session.initialize().unwrap();
    session.launch().unwrap();
    session.handle_event(stopped(1)).unwrap();
    (session, log)
}

fn stack_trace_requests(log: &RequestLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with("stackTrace"))
        .cloned()
        .collect()
}

#[test]
fn test_call_stack_fetched_in_pages_of_20() {
    let (mut session, log) = stopped_session(45);

    session.fetch_call_stack(1, 20).unwrap();
    let thread = session.thread(1).unwrap();
    assert_eq!(thread.call_stack().len(), 20);
    assert!(!thread.reached_end_of_call_stack());

    session.fetch_call_stack(1, 20).unwrap();
    let thread = session.thread(1).unwrap();
    assert_eq!(thread.call_stack().len(), 40);
    assert!(!thread.reached_end_of_call_stack());

    session.fetch_call_stack(1, 20).unwrap();
    let thread = session.thread(1).unwrap();
    assert_eq!(thread.call_stack().len(), 45);
    assert!(thread.reached_end_of_call_stack());

    assert_eq!(
        stack_trace_requests(&log),
        vec![
            "stackTrace 1 0 20".to_string(),
            "stackTrace 1 20 20".to_string(),
            "stackTrace 1 40 20".to_string(),
        ]
    );

    // frames arrive in order, innermost first
    let names: Vec<&str> = session
        .thread(1)
        .unwrap()
        .call_stack()
        .iter()
        .take(3)
        .map(|frame| frame.name())
        .collect();
    assert_eq!(names, vec!["fn_0", "fn_1", "fn_2"]);
}

#[test]
fn test_fetch_past_the_end_changes_nothing() {
    let (mut session, _log) = stopped_session(45);
    for _ in 0..3 {
        session.fetch_call_stack(1, 20).unwrap();
    }

    session.fetch_call_stack(1, 20).unwrap();
    let thread = session.thread(1).unwrap();
    assert_eq!(thread.call_stack().len(), 45);
    assert!(thread.reached_end_of_call_stack());
}

#[test]
fn test_fetch_is_a_no_op_on_a_running_thread() {
    let (mut session, log) = stopped_session(45);
    session.fetch_call_stack(1, 20).unwrap();

    session
        .handle_event(AdapterEvent::Continued {
            thread_id: 1,
            all_threads_continued: false,
        })
        .unwrap();

    let before = stack_trace_requests(&log).len();
    session.fetch_call_stack(1, 20).unwrap();
    assert_eq!(stack_trace_requests(&log).len(), before);

    let thread = session.thread(1).unwrap();
    assert!(thread.call_stack().is_empty());
    assert_eq!(thread.stale_call_stack().len(), 20);
}

#[test]
fn test_refetch_starts_over_after_a_new_stop() {
    let (mut session, log) = stopped_session(45);
    session.fetch_call_stack(1, 20).unwrap();
    session
        .handle_event(AdapterEvent::Continued {
            thread_id: 1,
            all_threads_continued: false,
        })
        .unwrap();
    session.handle_event(stopped(1)).unwrap();

    session.fetch_call_stack(1, 20).unwrap();
    let requests = stack_trace_requests(&log);
    assert_eq!(requests.last().unwrap(), "stackTrace 1 0 20");
    assert_eq!(session.thread(1).unwrap().call_stack().len(), 20);
}

#[test]
fn test_scopes_fetched_once_and_deduplicated() {
    let (mut session, log) = stopped_session(5);
    session.fetch_call_stack(1, 20).unwrap();
    let frame_id = session.thread(1).unwrap().top_stack_frame().unwrap().id();

    let scopes = session.scopes(1, frame_id).unwrap().unwrap();
    let indexed: Vec<(String, u32)> = scopes
        .iter()
        .map(|scope| (scope.name.clone(), scope.index))
        .collect();
    assert_eq!(
        indexed,
        vec![
            ("Locals".to_string(), 0),
            ("Locals".to_string(), 1),
            ("Registers".to_string(), 0),
        ]
    );

    // memoized: the second query does not hit the adapter
    session.scopes(1, frame_id).unwrap().unwrap();
    let scope_requests = log
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with("scopes"))
        .count();
    assert_eq!(scope_requests, 1);
}

#[test]
fn test_forget_scopes_refetches() {
    let (mut session, log) = stopped_session(5);
    session.fetch_call_stack(1, 20).unwrap();
    let frame_id = session.thread(1).unwrap().top_stack_frame().unwrap().id();

    session.scopes(1, frame_id).unwrap().unwrap();
    session.forget_scopes(1, frame_id);
    session.scopes(1, frame_id).unwrap().unwrap();

    let scope_requests = log
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with("scopes"))
        .count();
    assert_eq!(scope_requests, 2);
}

#[test]
fn test_frames_of_one_source_share_the_resolution() {
    let (mut session, _log) = stopped_session(5);
    session.fetch_call_stack(1, 20).unwrap();

    let stack = session.thread(1).unwrap().call_stack();
    assert!(Rc::ptr_eq(stack[0].source(), stack[1].source()));
    assert!(!stack[0].source().in_memory());
}

#[test]
fn test_sourceless_frames_get_virtual_addresses() {
    let mut adapter = MockAdapter::new();
    let mut virtual_frame = frame(0, "generated", 1);
    virtual_frame.source = Some(protocol::Source {
        name: Some("eval.js".to_string()),
        path: None,
        source_reference: Some(9),
        ..Default::default()
    });
    adapter.stacks.insert(1, vec![virtual_frame]);

    let mut session = Session::new(launch_config(), Box::new(adapter));
    session.initialize().unwrap();
    session.launch().unwrap();
    session.handle_event(stopped(1)).unwrap();
    session.fetch_call_stack(1, 20).unwrap();

    let session_id = session.id();
    let stack = session.thread(1).unwrap().call_stack();
    let source = stack[0].source();
    assert!(source.in_memory());
    assert_eq!(
        source.uri().to_string(),
        format!("debug:eval.js?session={session_id}&ref=9")
    );
}

#[test]
fn test_evaluate_without_data_is_a_normal_outcome() {
    let (mut session, _log) = stopped_session(5);
    let result = session.evaluate("not_a_variable", None, None).unwrap();
    assert!(result.is_none());

    // the session is still alive: absent data is not a failure
    assert!(session
        .thread(1)
        .map(|thread| thread.stopped())
        .unwrap_or(false));
}

use async_trait::async_trait;
use meguri::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CMD_WF: &str = "command";
const CUSTOM_WF: &str = "custom";
const NON_STOP_WF: &str = "non-stop";
const ERROR_WF: &str = "error";

const STATE1: &str = "state1";
const STATE2: &str = "state2";
const STATE3: &str = "state3";
const STATE4: &str = "state4";
const STATE_ERROR: &str = "stateError";

const OUTPUT_KEY: &str = "output";

// Appends the current state and a separator to the output.
fn dummy_work(ev: &mut dyn Event) {
    let mut out = ev
        .context_value::<String>(OUTPUT_KEY)
        .cloned()
        .unwrap_or_default();
    out.push_str(ev.state().as_str());
    out.push('+');
    ev.set_context(OUTPUT_KEY, out);
}

fn step_to(next: &'static str) -> impl Fn(&mut dyn Event) + Send + Sync + 'static {
    move |ev: &mut dyn Event| {
        dummy_work(ev);
        ev.set_state(StateName::new(next));
    }
}

fn step_a() -> impl Fn(&mut dyn Event) + Send + Sync + 'static {
    step_to(STATE1)
}

fn step_b() -> impl Fn(&mut dyn Event) + Send + Sync + 'static {
    step_to(STATE2)
}

fn step_c() -> impl Fn(&mut dyn Event) + Send + Sync + 'static {
    step_to(STATE3)
}

fn step_d() -> impl Fn(&mut dyn Event) + Send + Sync + 'static {
    step_to(STATE4)
}

fn step_e(ev: &mut dyn Event) {
    ev.set_error(Failure::msg("failed in stepE"));
    ev.set_state(StateName::new(STATE_ERROR));
}

fn step_f(ev: &mut dyn Event) {
    dummy_work(ev);
    ev.set_state(StateName::STOP);
}

fn cmd_workflow() -> Result<Workflow, WorkflowError> {
    Workflow::builder()
        .add_fn(StateName::START, step_a())
        .add_fn(STATE1, step_b())
        .add_fn(STATE2, step_c())
        .add_fn(STATE3, step_d())
        .build()
}

fn custom_workflow() -> Result<Workflow, WorkflowError> {
    Workflow::builder()
        .add_fn(StateName::START, step_d())
        .add_fn(STATE4, step_c())
        .add_fn(STATE3, step_b())
        .add_fn(STATE2, step_a())
        .build()
}

fn error_workflow() -> Result<Workflow, WorkflowError> {
    Workflow::builder()
        .add_fn(StateName::START, step_a())
        .add_fn(STATE1, step_b())
        .add_fn(STATE2, step_e)
        .add_fn(STATE3, step_d())
        .add_fn(STATE_ERROR, step_f)
        .build()
}

macro_rules! test_event {
    ($name:ident, $($stop:expr),+) => {
        struct $name {
            base: BaseEvent,
        }

        impl $name {
            fn new(name: &str) -> Self {
                Self {
                    base: BaseEvent::new(name, format!("txn-{}", name)),
                }
            }
        }

        impl Event for $name {
            fn base(&self) -> &BaseEvent {
                &self.base
            }

            fn base_mut(&mut self) -> &mut BaseEvent {
                &mut self.base
            }

            fn should_stop(&self) -> bool {
                $(*self.state() == $stop)||+
            }

            fn default_enrichment_id(&self) -> Result<String, Failure> {
                Ok("SomeID".to_string())
            }
        }
    };
}

test_event!(CmdEvent, STATE4, StateName::STOP);
test_event!(CustomEvent, STATE1, StateName::STOP);
test_event!(NonStopEvent, "Infinite");

fn output(ev: &dyn Event) -> Option<&str> {
    ev.context_value::<String>(OUTPUT_KEY).map(String::as_str)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_workflows_in_parallel() {
    let engine = Arc::new(Engine::new());
    engine.add(CMD_WF, cmd_workflow().expect("valid command workflow"));
    engine.add(CUSTOM_WF, custom_workflow().expect("valid custom workflow"));

    let cmd_engine = Arc::clone(&engine);
    let cmd = tokio::spawn(async move {
        let mut ev = CmdEvent::new(CMD_WF);
        let result = cmd_engine.run(CMD_WF, &mut ev).await;
        (result, ev)
    });

    let custom_engine = Arc::clone(&engine);
    let custom = tokio::spawn(async move {
        let mut ev = CustomEvent::new(CUSTOM_WF);
        let result = custom_engine.run(CUSTOM_WF, &mut ev).await;
        (result, ev)
    });

    let (cmd_result, cmd_ev) = cmd.await.expect("command task");
    let (custom_result, custom_ev) = custom.await.expect("custom task");

    assert!(cmd_result.is_ok(), "expected ok, got {:?}", cmd_result);
    assert!(custom_result.is_ok(), "expected ok, got {:?}", custom_result);
    assert_eq!(output(&cmd_ev), Some("STATE_START+state1+state2+state3+"));
    assert_eq!(output(&custom_ev), Some("STATE_START+state4+state3+state2+"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_workflow_shared_by_many_runs() {
    let engine = Arc::new(Engine::new());
    engine.add(CMD_WF, cmd_workflow().expect("valid command workflow"));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let mut ev = CmdEvent::new(&format!("{}-{}", CMD_WF, i));
                engine.run(CMD_WF, &mut ev).await.map(|()| ev)
            })
        })
        .collect();

    for handle in handles {
        let ev = handle.await.expect("task").expect("run succeeds");
        assert_eq!(output(&ev), Some("STATE_START+state1+state2+state3+"));
        assert_eq!(ev.state(), &StateName::new(STATE4));
    }
}

#[tokio::test]
async fn test_missing_handler_aborts_run() {
    let engine = Engine::new();
    engine.add(NON_STOP_WF, cmd_workflow().expect("valid command workflow"));

    let mut ev = NonStopEvent::new(NON_STOP_WF);
    let result = engine.run(NON_STOP_WF, &mut ev).await;

    assert!(matches!(
        result,
        Err(WorkflowError::NoHandler(ref state)) if *state == STATE4
    ));
    assert_eq!(ev.state(), &StateName::new(STATE4));
    assert_eq!(output(&ev), Some("STATE_START+state1+state2+state3+"));
}

#[tokio::test]
async fn test_unclassified_error_is_propagated() {
    let engine = Engine::new();
    engine.add(ERROR_WF, error_workflow().expect("valid error workflow"));

    let mut ev = CmdEvent::new(ERROR_WF);
    let result = engine.run(ERROR_WF, &mut ev).await;

    match result {
        Err(WorkflowError::Failed { state, source }) => {
            assert_eq!(state, StateName::STOP);
            assert!(source.classified().is_none());
            assert_eq!(source.to_string(), "failed in stepE");
        }
        other => panic!("expected failed run, got {:?}", other),
    }
    assert!(ev.error().is_some());
    assert_eq!(output(&ev), Some("STATE_START+state1+stateError+"));
}

#[tokio::test]
async fn test_non_retriable_error_is_swallowed() {
    let engine = Engine::new();
    engine.add(ERROR_WF, error_workflow().expect("valid error workflow"));

    let mut ev = CmdEvent::new(ERROR_WF);
    ev.set_state(StateName::new(STATE4));
    ev.set_error(ClassifiedError::new(BAD_REQUEST_PAYLOAD, "error", false).into());

    let result = engine.run(ERROR_WF, &mut ev).await;

    assert!(result.is_ok(), "expected ok, got {:?}", result);
    assert!(ev.error().is_some_and(Failure::is_terminal));
    assert_eq!(output(&ev), None);
}

#[tokio::test]
async fn test_retriable_error_is_propagated() {
    let engine = Engine::new();
    engine.add(ERROR_WF, error_workflow().expect("valid error workflow"));

    let mut ev = CmdEvent::new(ERROR_WF);
    ev.set_state(StateName::STOP);
    ev.set_error(ClassifiedError::new("UNAVAILABLE", "try later", true).into());

    let result = engine.run(ERROR_WF, &mut ev).await;

    match result {
        Err(WorkflowError::Failed { source, .. }) => {
            assert_eq!(
                source.classified().map(|e| e.code.as_str()),
                Some("UNAVAILABLE")
            );
        }
        other => panic!("expected failed run, got {:?}", other),
    }
}

#[derive(Debug)]
struct ValidateOrder;

#[async_trait]
impl Step for ValidateOrder {
    async fn execute(&self, event: &mut dyn Event) -> Result<StepOutput, Failure> {
        match event.context_value::<String>("order_id") {
            Some(_) => Ok(StepOutput::stop()),
            None => Err(ClassifiedError::bad_request("missing order_id").into()),
        }
    }
}

test_event!(OrderEvent, StateName::STOP, StateName::ERROR);

#[tokio::test]
async fn test_step_failure_with_bad_request_ends_quietly() {
    let workflow = Workflow::builder()
        .add_step(StateName::START, ValidateOrder)
        .build()
        .expect("valid workflow");

    let mut ev = OrderEvent::new("orders");
    let result = workflow.run(&mut ev).await;

    assert!(result.is_ok(), "expected ok, got {:?}", result);
    assert_eq!(ev.state(), &StateName::ERROR);
    assert_eq!(
        ev.error()
            .and_then(Failure::classified)
            .map(|e| e.code.as_str()),
        Some(BAD_REQUEST_PAYLOAD)
    );

    let mut ev = OrderEvent::new("orders");
    ev.set_context("order_id", "A-1".to_string());
    assert!(workflow.run(&mut ev).await.is_ok());
    assert_eq!(ev.state(), &StateName::STOP);
    assert!(ev.error().is_none());
}

struct InvoiceEvent {
    base: BaseEvent,
    amount_cents: u64,
}

impl Event for InvoiceEvent {
    fn base(&self) -> &BaseEvent {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseEvent {
        &mut self.base
    }

    fn should_stop(&self) -> bool {
        *self.state() == StateName::STOP || *self.state() == StateName::ERROR
    }

    fn default_enrichment_id(&self) -> Result<String, Failure> {
        Ok(self.transaction_id().to_string())
    }
}

struct Bill;

#[async_trait]
impl Step for Bill {
    async fn execute(&self, event: &mut dyn Event) -> Result<StepOutput, Failure> {
        let invoice = event
            .downcast_mut::<InvoiceEvent>()
            .ok_or_else(|| ClassifiedError::bad_request("not an invoice event"))?;
        invoice.amount_cents += 50;
        let billed = invoice.amount_cents;
        event.set_context("billed_cents", billed);
        Ok(StepOutput::stop())
    }
}

#[tokio::test]
async fn test_step_reaches_concrete_event_fields() {
    let workflow = Workflow::builder()
        .add_step(StateName::START, Bill)
        .build()
        .expect("valid workflow");

    let mut invoice = InvoiceEvent {
        base: BaseEvent::new("invoices", "txn-inv-1"),
        amount_cents: 1_000,
    };
    assert!(workflow.run(&mut invoice).await.is_ok());
    assert_eq!(invoice.amount_cents, 1_050);
    assert_eq!(invoice.context_value::<u64>("billed_cents"), Some(&1_050));

    let mut order = OrderEvent::new("orders");
    assert!(workflow.run(&mut order).await.is_ok());
    assert_eq!(order.state(), &StateName::ERROR);
    assert!(order.error().is_some_and(Failure::is_terminal));
}

#[tokio::test]
async fn test_unknown_workflow_is_not_found() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let engine = Engine::new();
    engine.add(
        CMD_WF,
        Workflow::builder()
            .add_fn(StateName::START, move |ev| {
                counter.fetch_add(1, Ordering::SeqCst);
                ev.set_state(StateName::STOP);
            })
            .build()
            .expect("valid workflow"),
    );

    let mut ev = CmdEvent::new("missing");
    let result = engine.run("missing", &mut ev).await;

    assert!(matches!(result, Err(WorkflowError::NotFound(ref name)) if name == "missing"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ev.state(), &StateName::START);
}

struct Hop {
    next: &'static str,
    visits: Arc<AtomicUsize>,
}

#[async_trait]
impl Step for Hop {
    async fn execute(&self, _event: &mut dyn Event) -> Result<StepOutput, Failure> {
        self.visits.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(StepOutput::next(self.next))
    }
}

#[tokio::test]
async fn test_event_that_never_stops_keeps_running() {
    let visits = Arc::new(AtomicUsize::new(0));
    let workflow = Workflow::builder()
        .add_step(
            StateName::START,
            Hop {
                next: STATE1,
                visits: Arc::clone(&visits),
            },
        )
        .add_step(
            STATE1,
            Hop {
                next: STATE2,
                visits: Arc::clone(&visits),
            },
        )
        .add_step(
            STATE2,
            Hop {
                next: STATE1,
                visits: Arc::clone(&visits),
            },
        )
        .build()
        .expect("valid workflow");

    let mut ev = NonStopEvent::new(NON_STOP_WF);
    let watchdog = tokio::time::timeout(Duration::from_millis(200), workflow.run(&mut ev)).await;

    assert!(watchdog.is_err(), "run returned: {:?}", watchdog);
    assert!(visits.load(Ordering::SeqCst) > 3);
}

#[test]
fn test_new_workflow_requires_start_handler() {
    assert!(cmd_workflow().is_ok());

    let mut steps: HashMap<StateName, Box<dyn Step>> = HashMap::new();
    steps.insert(STATE4.into(), Box::new(FnStep::new(step_c())));
    steps.insert(STATE3.into(), Box::new(FnStep::new(step_b())));
    steps.insert(STATE2.into(), Box::new(FnStep::new(step_a())));

    assert!(matches!(
        Workflow::new(steps),
        Err(WorkflowError::Configuration(_))
    ));
}

#[test]
fn test_enrichment_id_is_not_used_by_the_loop() {
    let ev = CmdEvent::new(CMD_WF);
    assert_eq!(ev.default_enrichment_id().ok().as_deref(), Some("SomeID"));
    assert_eq!(ev.name(), CMD_WF);
    assert_eq!(ev.transaction_id(), "txn-command");
}

//! Order processing with struct steps, classified failures and concurrent runs.
//!
//! Demonstrates:
//! - A concrete event type carrying its own fields, reached from steps by downcasting
//! - Steps that branch and fail with classified errors
//! - Telling a clean finish from a handled failure after `Ok(())`

use async_trait::async_trait;
use meguri::prelude::*;
use std::sync::Arc;

const VALIDATE: &str = "validate";
const CHARGE: &str = "charge";
const SHIP: &str = "ship";

#[derive(Debug, Clone)]
struct Order {
    id: String,
    amount_cents: u64,
    address: Option<String>,
}

struct OrderEvent {
    base: BaseEvent,
    order: Order,
}

impl OrderEvent {
    fn new(order: Order) -> Self {
        Self {
            base: BaseEvent::new("orders", format!("txn-{}", order.id)),
            order,
        }
    }

    fn order(ev: &dyn Event) -> Option<&Order> {
        ev.downcast_ref::<OrderEvent>().map(|ev| &ev.order)
    }
}

impl Event for OrderEvent {
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
        Ok(self.order.id.clone())
    }
}

#[derive(Debug)]
struct Intake;

#[async_trait]
impl Step for Intake {
    async fn execute(&self, event: &mut dyn Event) -> Result<StepOutput, Failure> {
        let id = event.default_enrichment_id()?;
        println!("[{}] intake", id);
        Ok(StepOutput::next(VALIDATE))
    }
}

#[derive(Debug)]
struct Validate;

#[async_trait]
impl Step for Validate {
    async fn execute(&self, event: &mut dyn Event) -> Result<StepOutput, Failure> {
        let order = OrderEvent::order(event)
            .ok_or_else(|| ClassifiedError::bad_request("not an order event"))?;

        if order.amount_cents == 0 {
            return Err(ClassifiedError::bad_request("order amount must be positive").into());
        }
        Ok(StepOutput::next(CHARGE))
    }
}

#[derive(Debug)]
struct Charge;

#[async_trait]
impl Step for Charge {
    async fn execute(&self, event: &mut dyn Event) -> Result<StepOutput, Failure> {
        let amount = OrderEvent::order(event)
            .map(|o| o.amount_cents)
            .ok_or_else(|| ClassifiedError::bad_request("not an order event"))?;
        if amount > 100_000 {
            return Err(ClassifiedError::new("PAYMENT_DECLINED", "limit exceeded", true).into());
        }
        event.set_context("charged_cents", amount);
        Ok(StepOutput::next(SHIP))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let workflow = Workflow::builder()
        .add_step(StateName::START, Intake)
        .add_step(VALIDATE, Validate)
        .add_step(CHARGE, Charge)
        .add_fn(SHIP, |ev| {
            let shipped = OrderEvent::order(ev).and_then(|o| o.address.clone());
            match shipped {
                Some(address) => {
                    ev.set_context("shipped_to", address);
                    ev.set_state(StateName::STOP);
                }
                None => {
                    ev.set_error(ClassifiedError::bad_request("no shipping address").into());
                    ev.set_state(StateName::ERROR);
                }
            }
        })
        .build()?;

    let engine = Arc::new(Engine::new());
    engine.add("orders", workflow);

    let orders = vec![
        Order {
            id: "A-1".to_string(),
            amount_cents: 2_500,
            address: Some("1 Main St".to_string()),
        },
        Order {
            id: "A-2".to_string(),
            amount_cents: 0,
            address: None,
        },
        Order {
            id: "A-3".to_string(),
            amount_cents: 250_000,
            address: Some("9 Hill Rd".to_string()),
        },
    ];

    let handles: Vec<_> = orders
        .into_iter()
        .map(|order| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let mut ev = OrderEvent::new(order);
                let result = engine.run("orders", &mut ev).await;
                (result, ev)
            })
        })
        .collect();

    for handle in handles {
        let (result, ev) = handle.await?;
        match (result, ev.error()) {
            (Ok(()), None) => println!(
                "[{}] shipped to {:?}",
                ev.order.id,
                ev.context_value::<String>("shipped_to")
            ),
            (Ok(()), Some(handled)) => println!("[{}] rejected: {}", ev.order.id, handled),
            (Err(e), _) => println!("[{}] needs retry: {}", ev.order.id, e),
        }
    }

    Ok(())
}

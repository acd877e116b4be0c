//! Two-state workflow driven by closures through the global engine.

use meguri::prelude::*;

struct Greeting {
    base: BaseEvent,
}

impl Event for Greeting {
    fn base(&self) -> &BaseEvent {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseEvent {
        &mut self.base
    }

    fn should_stop(&self) -> bool {
        *self.state() == StateName::STOP
    }

    fn default_enrichment_id(&self) -> Result<String, Failure> {
        Ok(self.transaction_id().to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let workflow = Workflow::builder()
        .add_fn(StateName::START, |ev| {
            ev.set_context("greeting", "hello".to_string());
            ev.set_state(StateName::new("shout"));
        })
        .add_fn("shout", |ev| {
            let loud = ev
                .context_value::<String>("greeting")
                .map(|s| s.to_uppercase())
                .unwrap_or_default();
            ev.set_context("greeting", loud);
            ev.set_state(StateName::STOP);
        })
        .build()?;

    Engine::global().add("greeting", workflow);

    let mut ev = Greeting {
        base: BaseEvent::new("greeting", "txn-0001"),
    };
    Engine::global().run("greeting", &mut ev).await?;

    if let Some(greeting) = ev.context_value::<String>("greeting") {
        println!("Greeting: {}", greeting);
    }

    Ok(())
}

//! Simple chain example
//!
//! Demonstrates a two-executor sequential workflow: A doubles the input,
//! B adds ten, and both contribute to the workflow's output.

use async_trait::async_trait;
use std::sync::Arc;
use workflow_core::binding::ExecutorBinding;
use workflow_core::config::{ExecutorOptions, WorkflowOptions};
use workflow_core::executor::{Executor, RouteTable};
use workflow_core::graph::WorkflowBuilder;
use workflow_core::id::{ExecutorId, TypeId};
use workflow_core::portable::PortableValue;
use workflow_core::run::Run;

struct IntStep {
    id: ExecutorId,
    op: fn(i64) -> i64,
}

#[async_trait]
impl Executor for IntStep {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn options(&self) -> ExecutorOptions {
        ExecutorOptions {
            auto_send_message_handler_result_object: true,
            declare_cross_run_shareable: false,
        }
    }

    fn routes(&self) -> RouteTable {
        let op = self.op;
        RouteTable::builder()
            .on_type(TypeId::named("i64"), move |value, _ctx| {
                Box::pin(async move {
                    let n = *value.as_ref::<i64>().expect("i64 payload");
                    println!("executing {}: {n} -> {}", std::any::type_name::<IntStep>(), op(n));
                    Ok(Some(PortableValue::eager(op(n), TypeId::named("i64"))))
                })
            })
            .build()
    }
}

fn step(id: &str, op: fn(i64) -> i64) -> ExecutorBinding {
    let eid = ExecutorId::new(id);
    ExecutorBinding::fresh(eid.clone(), "int_step", move |_run_id| {
        Arc::new(IntStep {
            id: eid.clone(),
            op,
        }) as Arc<dyn Executor>
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Simple Chain Example ===\n");

    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_binding(step("double", |n| n * 2))?
            .add_binding(step("add_ten", |n| n + 10))?
            .start_with(ExecutorId::new("double"))
            .add_edge(ExecutorId::new("double"), ExecutorId::new("add_ten"))
            .with_output_from([ExecutorId::new("double"), ExecutorId::new("add_ten")])
            .build()?,
    );

    let run = Run::start(workflow, WorkflowOptions::default(), None);
    run.enqueue(PortableValue::eager(5i64, TypeId::named("i64")), TypeId::named("i64"));

    println!("Initial input: 5\n");
    run.run_to_next_halt().await?;

    for event in run.drain_events().await {
        if let workflow_core::events::WorkflowEvent::WorkflowOutput { executor_id, value, .. } = event {
            println!("{executor_id} produced {value}");
        }
    }

    println!("\nExpected: (5 * 2) + 10 = 20");
    Ok(())
}

//! Conditional routing example
//!
//! Demonstrates a switch edge: a router executor picks one of two
//! downstream executors based on the value it sees, reduced at build time
//! to a fan-out with predicate-partitioning.

use async_trait::async_trait;
use std::sync::Arc;
use workflow_core::binding::ExecutorBinding;
use workflow_core::config::{ExecutorOptions, WorkflowOptions};
use workflow_core::executor::{Executor, RouteTable};
use workflow_core::graph::WorkflowBuilder;
use workflow_core::id::{ExecutorId, TypeId};
use workflow_core::portable::PortableValue;
use workflow_core::run::Run;

struct PassThrough {
    id: ExecutorId,
}

#[async_trait]
impl Executor for PassThrough {
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
        RouteTable::builder()
            .on_type(TypeId::named("i64"), |value, _ctx| {
                Box::pin(async move { Ok(Some(value)) })
            })
            .build()
    }
}

struct IntStep {
    id: ExecutorId,
    label: &'static str,
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
        let label = self.label;
        RouteTable::builder()
            .on_type(TypeId::named("i64"), move |value, _ctx| {
                Box::pin(async move {
                    let n = *value.as_ref::<i64>().expect("i64 payload");
                    println!("taking the {label} path...");
                    Ok(Some(PortableValue::eager(op(n), TypeId::named("i64"))))
                })
            })
            .build()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Conditional Routing Example ===\n");

    let multiply_id = ExecutorId::new("multiply");
    let add_id = ExecutorId::new("add");

    let is_even = workflow_core::edge::typed_predicate::<i64, _>(|n| n % 2 == 0);

    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_binding(ExecutorBinding::fresh(
                ExecutorId::new("router"),
                "router",
                |_| Arc::new(PassThrough { id: ExecutorId::new("router") }) as Arc<dyn Executor>,
            ))?
            .add_binding(ExecutorBinding::fresh(multiply_id.clone(), "int_step", |_| {
                Arc::new(IntStep {
                    id: ExecutorId::new("multiply"),
                    label: "multiply",
                    op: |n| n * 2,
                }) as Arc<dyn Executor>
            }))?
            .add_binding(ExecutorBinding::fresh(add_id.clone(), "int_step", |_| {
                Arc::new(IntStep {
                    id: ExecutorId::new("add"),
                    label: "add",
                    op: |n| n + 100,
                }) as Arc<dyn Executor>
            }))?
            .start_with(ExecutorId::new("router"))
            .add_switch(
                ExecutorId::new("router"),
                vec![multiply_id.clone(), add_id.clone()],
                vec![is_even],
                Some(1),
            )
            .with_output_from([multiply_id, add_id])
            .build()?,
    );

    for input in [4i64, 7i64] {
        let run = Run::start(workflow.clone(), WorkflowOptions::default(), None);
        run.enqueue(PortableValue::eager(input, TypeId::named("i64")), TypeId::named("i64"));
        run.run_to_next_halt().await?;
        for event in run.drain_events().await {
            if let workflow_core::events::WorkflowEvent::WorkflowOutput { value, .. } = event {
                println!("input {input} -> output {value}\n");
            }
        }
    }

    Ok(())
}

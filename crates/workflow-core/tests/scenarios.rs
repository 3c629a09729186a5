//! Integration tests for the literal scenarios and testable properties.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use workflow_core::binding::ExecutorBinding;
use workflow_core::config::WorkflowOptions;
use workflow_core::envelope::ExternalResponse;
use workflow_core::error::Result;
use workflow_core::executor::{Executor, RouteTable};
use workflow_core::graph::WorkflowBuilder;
use workflow_core::id::{ExecutorId, PortId, TypeId};
use workflow_core::portable::PortableValue;
use workflow_core::run::Run;
use workflow_core::scheduler::RunStatus;

struct Transform {
    id: ExecutorId,
    f: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

#[async_trait]
impl Executor for Transform {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn options(&self) -> workflow_core::config::ExecutorOptions {
        workflow_core::config::ExecutorOptions {
            auto_send_message_handler_result_object: true,
            declare_cross_run_shareable: false,
        }
    }

    fn routes(&self) -> RouteTable {
        let f = self.f.clone();
        RouteTable::builder().on_type(TypeId::of::<String>(), move |value, _ctx| {
            let f = f.clone();
            Box::pin(async move {
                let s = value.as_ref::<String>().expect("string payload");
                Ok(Some(PortableValue::of(f(&s))))
            })
        }).build()
    }
}

fn transform_binding(id: &str, f: impl Fn(&str) -> String + Send + Sync + 'static) -> ExecutorBinding {
    let eid = ExecutorId::new(id);
    let f: Arc<dyn Fn(&str) -> String + Send + Sync> = Arc::new(f);
    ExecutorBinding::fresh(eid.clone(), "transform", move |_run_id| {
        Arc::new(Transform {
            id: eid.clone(),
            f: f.clone(),
        }) as Arc<dyn Executor>
    })
}

#[tokio::test]
async fn s1_sequential_chain_produces_outputs_in_order() {
    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_binding(transform_binding("A", |s| format!("{s}-a")))
            .unwrap()
            .add_binding(transform_binding("B", |s| format!("{s}-b")))
            .unwrap()
            .add_binding(transform_binding("C", |s| format!("{s}-c")))
            .unwrap()
            .start_with(ExecutorId::new("A"))
            .add_edge(ExecutorId::new("A"), ExecutorId::new("B"))
            .add_edge(ExecutorId::new("B"), ExecutorId::new("C"))
            .with_output_from([ExecutorId::new("A"), ExecutorId::new("B"), ExecutorId::new("C")])
            .build()
            .unwrap(),
    );

    let run = Run::start(workflow, WorkflowOptions::default(), None);
    run.enqueue(PortableValue::of("ping".to_string()), TypeId::of::<String>());
    let status = run.run_to_next_halt().await.unwrap();
    assert_eq!(status, RunStatus::Idle);

    let outputs: Vec<String> = run
        .drain_events()
        .await
        .into_iter()
        .filter_map(|event| match event {
            workflow_core::events::WorkflowEvent::WorkflowOutput { value, .. } => {
                Some(value.as_str().unwrap().to_string())
            }
            _ => None,
        })
        .collect();

    assert_eq!(outputs, vec!["ping-a", "ping-a-b", "ping-a-b-c"]);
}

struct IntTransform {
    id: ExecutorId,
    op: fn(i64) -> i64,
}

#[async_trait]
impl Executor for IntTransform {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn options(&self) -> workflow_core::config::ExecutorOptions {
        workflow_core::config::ExecutorOptions {
            auto_send_message_handler_result_object: true,
            declare_cross_run_shareable: false,
        }
    }

    fn routes(&self) -> RouteTable {
        let op = self.op;
        RouteTable::builder().on_type(TypeId::named("i64"), move |value, _ctx| {
            Box::pin(async move {
                let n = *value.as_ref::<i64>().expect("int payload");
                Ok(Some(PortableValue::eager(op(n), TypeId::named("i64"))))
            })
        }).build()
    }
}

fn int_binding(id: &str, op: fn(i64) -> i64) -> ExecutorBinding {
    let eid = ExecutorId::new(id);
    ExecutorBinding::fresh(eid.clone(), "int_transform", move |_| {
        Arc::new(IntTransform {
            id: eid.clone(),
            op,
        }) as Arc<dyn Executor>
    })
}

struct Source {
    id: ExecutorId,
}

#[async_trait]
impl Executor for Source {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn options(&self) -> workflow_core::config::ExecutorOptions {
        workflow_core::config::ExecutorOptions {
            auto_send_message_handler_result_object: true,
            declare_cross_run_shareable: false,
        }
    }

    fn routes(&self) -> RouteTable {
        RouteTable::builder().on_type(TypeId::named("i64"), |value, _ctx| {
            Box::pin(async move { Ok(Some(value)) })
        }).build()
    }
}

struct AggregateSink {
    id: ExecutorId,
}

#[async_trait]
impl Executor for AggregateSink {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn options(&self) -> workflow_core::config::ExecutorOptions {
        workflow_core::config::ExecutorOptions {
            auto_send_message_handler_result_object: true,
            declare_cross_run_shareable: false,
        }
    }

    fn routes(&self) -> RouteTable {
        RouteTable::builder().on_type(TypeId::named("fan_in_aggregate"), |value, _ctx| {
            Box::pin(async move { Ok(Some(value)) })
        }).build()
    }
}

#[tokio::test]
async fn s2_fan_out_broadcast_then_fan_in() {
    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_binding(ExecutorBinding::fresh(ExecutorId::new("A"), "source", |_| {
                Arc::new(Source { id: ExecutorId::new("A") }) as Arc<dyn Executor>
            }))
            .unwrap()
            .add_binding(int_binding("B", |n| n * 2))
            .unwrap()
            .add_binding(int_binding("C", |n| n + 1))
            .unwrap()
            .add_binding(ExecutorBinding::fresh(ExecutorId::new("D"), "sink", |_| {
                Arc::new(AggregateSink { id: ExecutorId::new("D") }) as Arc<dyn Executor>
            }))
            .unwrap()
            .start_with(ExecutorId::new("A"))
            .add_fan_out(ExecutorId::new("A"), vec![ExecutorId::new("B"), ExecutorId::new("C")])
            .add_fan_in(vec![ExecutorId::new("B"), ExecutorId::new("C")], ExecutorId::new("D"))
            .with_output_from([ExecutorId::new("D")])
            .build()
            .unwrap(),
    );

    let run = Run::start(workflow, WorkflowOptions::default(), None);
    run.enqueue(PortableValue::eager(42i64, TypeId::named("i64")), TypeId::named("i64"));
    let status = run.run_to_next_halt().await.unwrap();
    assert_eq!(status, RunStatus::Idle);

    let events = run.drain_events().await;
    let step_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, workflow_core::events::WorkflowEvent::SuperStepCompleted { .. }))
        .collect();
    assert_eq!(step_events.len(), 3);
}

struct RequestingExecutor {
    id: ExecutorId,
}

#[async_trait]
impl Executor for RequestingExecutor {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn options(&self) -> workflow_core::config::ExecutorOptions {
        workflow_core::config::ExecutorOptions {
            auto_send_message_handler_result_object: true,
            declare_cross_run_shareable: false,
        }
    }

    fn routes(&self) -> RouteTable {
        RouteTable::builder().on_type(TypeId::named("kickoff"), |_value, _ctx| {
            Box::pin(async move {
                Ok(Some(PortableValue::eager(
                    "question".to_string(),
                    TypeId::named("Q"),
                )))
            })
        }).build()
    }
}

struct Recorder {
    id: ExecutorId,
    received: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Executor for Recorder {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn routes(&self) -> RouteTable {
        let received = self.received.clone();
        RouteTable::builder().on_type(TypeId::named("R"), move |value, _ctx| {
            let received = received.clone();
            Box::pin(async move {
                let answer = value.as_ref::<String>().expect("string answer");
                received.lock().unwrap().push(answer.to_string());
                Ok(None)
            })
        }).build()
    }
}

#[tokio::test]
async fn s5_external_request_response_round_trip() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_for_binding = received.clone();

    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_binding(ExecutorBinding::fresh(ExecutorId::new("X"), "requester", |_| {
                Arc::new(RequestingExecutor { id: ExecutorId::new("X") }) as Arc<dyn Executor>
            }))
            .unwrap()
            .add_binding(ExecutorBinding::fresh(ExecutorId::new("Y"), "recorder", move |_| {
                Arc::new(Recorder {
                    id: ExecutorId::new("Y"),
                    received: received_for_binding.clone(),
                }) as Arc<dyn Executor>
            }))
            .unwrap()
            .start_with(ExecutorId::new("X"))
            .add_external_call(
                ExecutorId::new("X"),
                PortId::new("P"),
                ExecutorId::new("Y"),
                TypeId::named("Q"),
                TypeId::named("R"),
                false,
            )
            .build()
            .unwrap(),
    );

    let run = Run::start(workflow, WorkflowOptions::default(), None);
    run.enqueue(PortableValue::eager((), TypeId::named("kickoff")), TypeId::named("kickoff"));
    let status = run.run_to_next_halt().await.unwrap();
    assert_eq!(status, RunStatus::PendingRequests);

    let events = run.drain_events().await;
    let request_id = events.iter().find_map(|e| match e {
        workflow_core::events::WorkflowEvent::ExternalRequestRaised { request_id, .. } => {
            Some(request_id.clone())
        }
        _ => None,
    }).expect("a request should have been raised");

    run.post_response(ExternalResponse {
        port_id: PortId::new("P"),
        request_id: request_id.clone(),
        data: PortableValue::eager("42".to_string(), TypeId::named("R")),
    })
    .unwrap();

    let status = run.run_to_next_halt().await.unwrap();
    assert_eq!(status, RunStatus::Idle);
    assert_eq!(received.lock().unwrap().as_slice(), &["42".to_string()]);

    let duplicate = run.post_response(ExternalResponse {
        port_id: PortId::new("P"),
        request_id,
        data: PortableValue::eager("99".to_string(), TypeId::named("R")),
    });
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn s3_stateful_fan_in_unbalanced_arrivals() {
    use workflow_core::edge::Edge;
    use workflow_core::id::EdgeId;

    let edge = Edge::fan_in(
        EdgeId::new("e1"),
        vec![ExecutorId::new("s1"), ExecutorId::new("s2")],
        ExecutorId::new("D"),
    );

    for n in 0..3 {
        let out = edge
            .route(&ExecutorId::new("s1"), PortableValue::of(n), TypeId::named("i64"))
            .unwrap();
        assert!(out.is_empty());
    }

    let out = edge
        .route(&ExecutorId::new("s2"), PortableValue::of(100i64), TypeId::named("i64"))
        .unwrap();
    assert_eq!(out.len(), 1);

    let snapshot = edge.export_state().unwrap();
    let remaining = snapshot.buffers.get(&ExecutorId::new("s1")).unwrap().len();
    assert_eq!(remaining, 2);
}

#[tokio::test]
async fn s6_handler_failure_is_fatal_and_status_is_failed() {
    struct Failing(ExecutorId);

    #[async_trait]
    impl Executor for Failing {
        fn id(&self) -> &ExecutorId {
            &self.0
        }

        fn routes(&self) -> RouteTable {
            RouteTable::builder().on_type(TypeId::of::<String>(), |_value, _ctx| {
                Box::pin(async move {
                    Err(workflow_core::error::WorkflowError::handler(
                        ExecutorId::new("B"),
                        "boom",
                    )) as Result<Option<PortableValue>>
                })
            }).build()
        }
    }

    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_binding(transform_binding("A", |s| s.to_string()))
            .unwrap()
            .add_binding(ExecutorBinding::fresh(ExecutorId::new("B"), "failing", |_| {
                Arc::new(Failing(ExecutorId::new("B"))) as Arc<dyn Executor>
            }))
            .unwrap()
            .start_with(ExecutorId::new("A"))
            .add_edge(ExecutorId::new("A"), ExecutorId::new("B"))
            .build()
            .unwrap(),
    );

    let run = Run::start(workflow, WorkflowOptions::default(), None);
    run.enqueue(PortableValue::of("ping".to_string()), TypeId::of::<String>());
    let result = run.run_to_next_halt().await;
    assert!(result.is_err());
}

struct Counter {
    id: ExecutorId,
    count: Mutex<i64>,
    restore_sink: Arc<Mutex<Option<i64>>>,
}

#[async_trait]
impl Executor for Counter {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn options(&self) -> workflow_core::config::ExecutorOptions {
        workflow_core::config::ExecutorOptions {
            auto_send_message_handler_result_object: true,
            declare_cross_run_shareable: false,
        }
    }

    fn routes(&self) -> RouteTable {
        RouteTable::builder().on_type(TypeId::named("tick"), |_value, ctx| {
            Box::pin(async move {
                ctx.request_halt(Some("first tick observed".to_string()));
                Ok(Some(PortableValue::eager(1i64, TypeId::named("i64"))))
            })
        }).build()
    }

    async fn on_checkpointing(&self) -> Option<PortableValue> {
        Some(PortableValue::eager(*self.count.lock().unwrap(), TypeId::named("i64")))
    }

    async fn on_checkpoint_restored(&self, snapshot: PortableValue) {
        let restored = *snapshot.as_ref::<i64>().expect("i64 snapshot");
        *self.count.lock().unwrap() = restored;
        *self.restore_sink.lock().unwrap() = Some(restored);
    }
}

#[tokio::test]
async fn s4_checkpoint_mid_run_then_resume_restores_executor_snapshot() {
    use workflow_checkpoint::{CheckpointConfig, InMemoryCheckpointManager};

    let restore_sink = Arc::new(Mutex::new(None));
    let manager = Arc::new(InMemoryCheckpointManager::new());

    let workflow = Arc::new(
        WorkflowBuilder::new()
            .add_binding(ExecutorBinding::fresh(ExecutorId::new("ctr"), "counter", {
                let restore_sink = restore_sink.clone();
                move |_run_id| {
                    Arc::new(Counter {
                        id: ExecutorId::new("ctr"),
                        count: Mutex::new(0),
                        restore_sink: restore_sink.clone(),
                    }) as Arc<dyn Executor>
                }
            }))
            .unwrap()
            .start_with(ExecutorId::new("ctr"))
            .with_output_from([ExecutorId::new("ctr")])
            .build()
            .unwrap(),
    );

    let options = WorkflowOptions::builder()
        .checkpoint_manager(manager.clone() as Arc<dyn workflow_checkpoint::CheckpointManager>)
        .build();

    let run = Run::start(workflow.clone(), options.clone(), None);
    let run_id = run.run_id().clone();
    run.enqueue(PortableValue::eager((), TypeId::named("tick")), TypeId::named("tick"));
    let status = run.run_to_next_halt().await.unwrap();
    assert_eq!(status, RunStatus::Completed);
    assert!(restore_sink.lock().unwrap().is_none());

    let resumed = workflow_core::run::resume(
        workflow,
        options,
        manager.as_ref(),
        CheckpointConfig::latest(run_id.to_string()),
    )
    .await
    .unwrap();

    assert_eq!(*restore_sink.lock().unwrap(), Some(0));

    resumed.enqueue(PortableValue::eager((), TypeId::named("tick")), TypeId::named("tick"));
    let status = resumed.run_to_next_halt().await.unwrap();
    assert_eq!(status, RunStatus::Completed);
}

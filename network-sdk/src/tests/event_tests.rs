//! Event bus tests
//!
//! Delivery order, payload access, subscriber isolation and log handler
//! routing.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::controller::NetworkController;
    use crate::error::Phase;
    use crate::events::{Category, EventBus, LogHandler, LogRecord, Stage, StageDetails};
    use crate::tests::support::{
        record_stages, stages, ItemDelegate, ItemQuery, ItemRequest, ScriptedTransport,
    };

    fn item_delegate(body: &str) -> ItemDelegate {
        ItemDelegate::new(Arc::new(ScriptedTransport::ok(body)))
    }

    #[tokio::test]
    async fn test_panicking_subscriber_does_not_affect_siblings() {
        let delegate = item_delegate(r#"{"name":"x"}"#);
        let controller = NetworkController::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&delivered);
        controller
            .events()
            .on_request(|_| panic!("subscriber failure"))
            .on_request(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let log = record_stages(controller.events());

        let content = controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap();

        assert_eq!(content, "x");
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(stages(&log), Stage::SUCCESS_SEQUENCE.to_vec());
    }

    #[tokio::test]
    async fn test_payloads_are_downcastable() {
        let delegate = item_delegate(r#"{"name":"x"}"#);
        let controller = NetworkController::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        controller.events().on_unmodified_request(move |event| {
            let request = event.details.downcast_ref::<ItemRequest>().cloned();
            sink.lock().unwrap().push(format!("{:?}", request));
        });
        let sink = Arc::clone(&seen);
        controller.events().on_modified_content(move |event| {
            assert!(event.details.is::<String>());
            assert!(event.details.downcast_ref::<ItemRequest>().is_none());
            sink.lock().unwrap().push(format!("{:?}", event.details));
        });

        controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Some(ItemRequest { id: 7 })".to_string(), "\"x\"".to_string()]
        );
    }

    #[tokio::test]
    async fn test_stage_subscribers_run_before_aggregated_ones() {
        let delegate = item_delegate(r#"{"name":"x"}"#);
        let controller = NetworkController::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&order);
        controller.events().on_any(move |event| {
            if event.stage == Stage::RawResponse {
                sink.lock().unwrap().push("any");
            }
        });
        let sink = Arc::clone(&order);
        controller
            .events()
            .on_raw_response(move |_| sink.lock().unwrap().push("stage"));

        controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["stage", "any"]);
    }

    #[tokio::test]
    async fn test_subscription_added_during_run_is_delivered() {
        let delegate = item_delegate(r#"{"name":"x"}"#);
        let controller = Arc::new(NetworkController::new());
        let late = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&controller);
        let counter = Arc::clone(&late);
        controller.events().on_transport_call(move |_| {
            if let Some(controller) = weak.upgrade() {
                let counter = Arc::clone(&counter);
                controller.events().on_content(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap();

        assert_eq!(late.load(Ordering::SeqCst), 1);
        assert_eq!(controller.events().subscriber_count(Stage::Content), 1);
    }

    #[tokio::test]
    async fn test_network_failure_fires_error_once() {
        let transport = Arc::new(ScriptedTransport::refusing());
        let delegate = ItemDelegate::new(transport.clone());
        let controller = NetworkController::new();
        let log = record_stages(controller.events());

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        controller
            .events()
            .on_error(move |event| sink.lock().unwrap().push(event.details.phase()));

        let error = controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap_err();

        assert_eq!(error.phase(), Phase::Network);
        assert!(error.is_network());
        assert_eq!(*errors.lock().unwrap(), vec![Phase::Network]);
        assert_eq!(delegate.error_count(), 1);

        let attempted = error.transport_call().unwrap();
        assert_eq!(attempted.request.url.path(), "/items/7");
        assert_eq!(attempted.session.name(), "scripted");

        let recorded = stages(&log);
        let mut expected = Stage::SUCCESS_SEQUENCE[..5].to_vec();
        expected.push(Stage::Error);
        assert_eq!(recorded, expected);
        assert!(!recorded.contains(&Stage::Content));
        assert!(!recorded.contains(&Stage::ModifiedContent));
    }

    #[tokio::test]
    async fn test_any_subscriber_sees_error_details() {
        let delegate = ItemDelegate::new(Arc::new(ScriptedTransport::refusing()));
        let controller = NetworkController::new();
        let phases = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&phases);
        controller.events().on_any(move |event| {
            if let StageDetails::Error(error) = event.details {
                sink.lock().unwrap().push(error.phase());
            }
        });

        let _ = controller.send(&delegate, ItemQuery { id: 7 }).await;

        assert_eq!(*phases.lock().unwrap(), vec![Phase::Network]);
    }

    struct CategorySink(Arc<Mutex<Vec<&'static str>>>);

    impl LogHandler for CategorySink {
        fn log(&self, record: &LogRecord<'_>) {
            let category = match record.category {
                Category::Request(_) => "request",
                Category::Response(_) => "response",
                Category::Error(_) => "error",
            };
            self.0.lock().unwrap().push(category);
        }
    }

    #[tokio::test]
    async fn test_log_handler_routes_categories() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let controller = NetworkController::builder()
            .log_handler(CategorySink(Arc::clone(&seen)))
            .build();

        let ok = item_delegate(r#"{"name":"x"}"#);
        controller.send(&ok, ItemQuery { id: 1 }).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["request", "response"]);

        seen.lock().unwrap().clear();
        let refused = ItemDelegate::new(Arc::new(ScriptedTransport::refusing()));
        controller.send(&refused, ItemQuery { id: 1 }).await.unwrap_err();
        assert_eq!(*seen.lock().unwrap(), vec!["request", "error"]);
    }

    #[test]
    fn test_subscriber_counts() {
        let bus = EventBus::new();
        bus.on_delegate(|_| {}).on_delegate(|_| {}).on_error(|_| {}).on_any(|_| {});

        assert_eq!(bus.subscriber_count(Stage::Delegate), 2);
        assert_eq!(bus.subscriber_count(Stage::Error), 1);
        assert_eq!(bus.subscriber_count(Stage::Content), 0);
        assert_eq!(Stage::ModifiedRawResponse.to_string(), "on_modified_raw_response");
    }
}

//! Override authority tests
//!
//! These tests attach interceptors to a controller and verify that their
//! replacements flow downstream, that their failures are classified by
//! phase, and that error hooks run in order.

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::{Arc, Mutex};

    use reqwest::StatusCode;

    use crate::controller::NetworkController;
    use crate::core::{
        HttpRequest, MockTransport, RawResponse, RequestInfo, RequestInterceptor, Session, TransportCall,
    };
    use crate::error::{ControllerError, Phase, StageResult};
    use crate::events::Stage;
    use crate::services::HeaderInterceptor;
    use crate::tests::support::{record_stages, stages, ItemDelegate, ItemQuery, ItemRequest, ScriptedTransport};

    #[tokio::test]
    async fn test_header_interceptor_reaches_dispatch() {
        let transport = Arc::new(ScriptedTransport::ok(r#"{"name":"x"}"#));
        let delegate = ItemDelegate::new(transport.clone());
        let interceptor = HeaderInterceptor::new().header("x-team", "core").unwrap();
        let controller = NetworkController::builder().interceptor(interceptor).build();

        let headers = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&headers);
        controller.events().on_unmodified_transport_call(move |event| {
            sink.lock()
                .unwrap()
                .push(event.details.request.header_str("x-team").map(str::to_string));
        });
        let sink = Arc::clone(&headers);
        controller.events().on_transport_call(move |event| {
            sink.lock()
                .unwrap()
                .push(event.details.request.header_str("x-team").map(str::to_string));
        });

        controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap();

        assert_eq!(*headers.lock().unwrap(), vec![None, Some("core".to_string())]);
        assert_eq!(transport.requests()[0].header_str("x-team"), Some("core"));
    }

    #[tokio::test]
    async fn test_mock_transport_receives_augmented_call() {
        let mut mock = MockTransport::new();
        mock.expect_dispatch()
            .withf(|request: &HttpRequest| request.header_str("authorization") == Some("Bearer t0k3n"))
            .times(1)
            .returning(|request: &HttpRequest| {
                Ok(RawResponse::new(StatusCode::OK, request.url.clone(), br#"{"name":"mocked"}"#.to_vec()))
            });

        let delegate = ItemDelegate::with_session(Session::named("mock", mock));
        let controller = NetworkController::builder()
            .interceptor(HeaderInterceptor::new().bearer("t0k3n").unwrap())
            .build();

        let content = controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap();
        assert_eq!(content, "mocked");
    }

    /// Rewrites the item id and upper-cases the content
    struct Rewriter;

    impl RequestInterceptor for Rewriter {
        fn request(&self, request: &mut dyn Any, _info: &RequestInfo) -> StageResult<()> {
            if let Some(request) = request.downcast_mut::<ItemRequest>() {
                request.id += 1;
            }
            Ok(())
        }

        fn content(&self, content: &mut dyn Any, _info: &RequestInfo) -> StageResult<()> {
            if let Some(content) = content.downcast_mut::<String>() {
                *content = content.to_uppercase();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_replacements_supersede_delegate_output() {
        let transport = Arc::new(ScriptedTransport::ok(r#"{"name":"widget"}"#));
        let delegate = ItemDelegate::new(transport.clone());
        let controller = NetworkController::builder().interceptor(Rewriter).build();

        let ids = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ids);
        controller.events().on_unmodified_request(move |event| {
            sink.lock().unwrap().push(event.details.downcast_ref::<ItemRequest>().map(|r| r.id));
        });
        let sink = Arc::clone(&ids);
        controller.events().on_request(move |event| {
            sink.lock().unwrap().push(event.details.downcast_ref::<ItemRequest>().map(|r| r.id));
        });

        let content = controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap();

        assert_eq!(content, "WIDGET");
        assert_eq!(*ids.lock().unwrap(), vec![Some(7), Some(8)]);
        assert_eq!(transport.requests()[0].url.path(), "/items/8");
    }

    /// Fails at exactly one override hook
    enum Failing {
        InRequest,
        BeforeDispatch,
        AfterDispatch,
        InResponse,
        InContent,
    }

    impl RequestInterceptor for Failing {
        fn request(&self, _request: &mut dyn Any, _info: &RequestInfo) -> StageResult<()> {
            match self {
                Failing::InRequest => Err("request rejected by policy".into()),
                _ => Ok(()),
            }
        }

        fn transport_call(&self, call: TransportCall, _info: &RequestInfo) -> StageResult<TransportCall> {
            match self {
                Failing::BeforeDispatch => Err("call rejected by policy".into()),
                _ => Ok(call),
            }
        }

        fn raw_response(&self, raw: RawResponse, _info: &RequestInfo) -> StageResult<RawResponse> {
            match self {
                Failing::AfterDispatch => Err(anyhow::anyhow!("response rejected by policy").into()),
                _ => Ok(raw),
            }
        }

        fn response(&self, _response: &mut dyn Any, _info: &RequestInfo) -> StageResult<()> {
            match self {
                Failing::InResponse => Err("parsed response rejected by policy".into()),
                _ => Ok(()),
            }
        }

        fn content(&self, content: &mut dyn Any, _info: &RequestInfo) -> StageResult<()> {
            match self {
                Failing::InContent => {
                    if let Some(content) = content.downcast_mut::<String>() {
                        content.push_str(" (partial)");
                    }
                    Err("content rejected by policy".into())
                }
                _ => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn test_hook_failures_are_classified_by_phase() {
        let transport = Arc::new(ScriptedTransport::ok(r#"{"name":"x"}"#));
        let delegate = ItemDelegate::new(transport.clone());

        let before = NetworkController::builder().interceptor(Failing::BeforeDispatch).build();
        let log = record_stages(before.events());
        let error = before.send(&delegate, ItemQuery { id: 7 }).await.unwrap_err();
        assert_eq!(error.phase(), Phase::Preprocessing);
        assert_eq!(transport.dispatch_count(), 0);
        assert_eq!(stages(&log).last(), Some(&Stage::Error));
        assert!(!stages(&log).contains(&Stage::TransportCall));

        let after = NetworkController::builder().interceptor(Failing::AfterDispatch).build();
        let error = after.send(&delegate, ItemQuery { id: 7 }).await.unwrap_err();
        assert_eq!(error.phase(), Phase::Postprocessing);
        assert!(error.to_string().contains("response rejected by policy"));
        assert_eq!(transport.dispatch_count(), 1);
        assert_eq!(delegate.error_count(), 2);
    }

    #[tokio::test]
    async fn test_request_hook_failure_is_preprocessing() {
        let transport = Arc::new(ScriptedTransport::ok(r#"{"name":"x"}"#));
        let delegate = ItemDelegate::new(transport.clone());
        let controller = NetworkController::builder().interceptor(Failing::InRequest).build();
        let log = record_stages(controller.events());

        let error = controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap_err();

        assert_eq!(error.phase(), Phase::Preprocessing);
        assert!(error.to_string().contains("request rejected by policy"));
        assert_eq!(transport.dispatch_count(), 0);
        assert_eq!(delegate.error_count(), 1);
        assert_eq!(
            stages(&log),
            vec![Stage::Delegate, Stage::UnmodifiedRequest, Stage::Error]
        );
    }

    #[tokio::test]
    async fn test_response_and_content_hook_failures_are_postprocessing() {
        for (interceptor, message, stages_before_error) in [
            (Failing::InResponse, "parsed response rejected by policy", 8),
            (Failing::InContent, "content rejected by policy", 10),
        ] {
            let transport = Arc::new(ScriptedTransport::ok(r#"{"name":"x"}"#));
            let delegate = ItemDelegate::new(transport.clone());
            let controller = NetworkController::builder().interceptor(interceptor).build();
            let log = record_stages(controller.events());

            let result = controller.send(&delegate, ItemQuery { id: 7 }).await;

            let error = result.unwrap_err();
            assert_eq!(error.phase(), Phase::Postprocessing);
            assert!(error.to_string().contains(message));
            assert_eq!(transport.dispatch_count(), 1);
            assert_eq!(delegate.error_count(), 1);

            let mut expected = Stage::SUCCESS_SEQUENCE[..stages_before_error].to_vec();
            expected.push(Stage::Error);
            assert_eq!(stages(&log), expected);
            assert!(!stages(&log).contains(&Stage::ModifiedContent));
        }
    }

    /// Records the order of error notifications
    struct ErrorObserver {
        delegate: Arc<ItemDelegate>,
        calls: Arc<Mutex<Vec<String>>>,
        panic: bool,
    }

    impl RequestInterceptor for ErrorObserver {
        fn error(&self, error: &ControllerError, _info: &RequestInfo) {
            self.calls.lock().unwrap().push(format!(
                "interceptor {} after {} delegate calls",
                error.phase(),
                self.delegate.error_count()
            ));
            if self.panic {
                panic!("error hook failure");
            }
        }
    }

    #[tokio::test]
    async fn test_error_hooks_run_in_order() {
        let delegate = Arc::new(ItemDelegate::new(Arc::new(ScriptedTransport::refusing())));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let controller = NetworkController::builder()
            .interceptor(ErrorObserver {
                delegate: Arc::clone(&delegate),
                calls: Arc::clone(&calls),
                panic: false,
            })
            .build();

        let sink = Arc::clone(&calls);
        controller
            .events()
            .on_error(move |_| sink.lock().unwrap().push("event".to_string()));

        let error = controller.send(&*delegate, ItemQuery { id: 7 }).await.unwrap_err();

        assert!(error.is_network());
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["interceptor network after 1 delegate calls".to_string(), "event".to_string()]
        );
    }

    #[tokio::test]
    async fn test_panicking_error_hook_keeps_terminal_error() {
        let delegate = Arc::new(ItemDelegate::new(Arc::new(ScriptedTransport::refusing())));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let controller = NetworkController::builder()
            .interceptor(ErrorObserver {
                delegate: Arc::clone(&delegate),
                calls: Arc::clone(&calls),
                panic: true,
            })
            .build();

        let sink = Arc::clone(&calls);
        controller
            .events()
            .on_error(move |_| sink.lock().unwrap().push("event".to_string()));

        let error = controller.send(&*delegate, ItemQuery { id: 7 }).await.unwrap_err();

        assert_eq!(error.phase(), Phase::Network);
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(delegate.error_count(), 1);
    }

    /// Sends every call through a fixed session
    struct Reroute(Session);

    impl RequestInterceptor for Reroute {
        fn transport_call(&self, call: TransportCall, _info: &RequestInfo) -> StageResult<TransportCall> {
            Ok(TransportCall::new(self.0.clone(), call.request))
        }
    }

    #[tokio::test]
    async fn test_session_substitution() {
        let original = Arc::new(ScriptedTransport::ok(r#"{"name":"original"}"#));
        let replacement = Arc::new(ScriptedTransport::ok(r#"{"name":"replacement"}"#));
        let delegate = ItemDelegate::new(original.clone());
        let controller = NetworkController::builder()
            .interceptor(Reroute(Session::from_arc("replacement", replacement.clone())))
            .build();

        let content = controller.send(&delegate, ItemQuery { id: 7 }).await.unwrap();

        assert_eq!(content, "replacement");
        assert_eq!(original.dispatch_count(), 0);
        assert_eq!(replacement.dispatch_count(), 1);
    }
}

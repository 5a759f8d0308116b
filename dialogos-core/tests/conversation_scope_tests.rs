//! Integration tests for the conversation scope
//!
//! These tests drive whole request sequences through the public API, the way a
//! request handler would.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dialogos_core::prelude::*;
use parking_lot::Mutex;

/// Wizard state kept across the steps of a multi-page form
#[derive(Default)]
struct Wizard {
    steps: Mutex<Vec<String>>,
}

struct AuditInterceptor {
    log: Arc<Mutex<Vec<String>>>,
}

impl LifecycleInterceptor<Wizard> for AuditInterceptor {
    fn execute_post_construct(&self, _instance: &Wizard) -> anyhow::Result<()> {
        self.log.lock().push("created".to_string());
        Ok(())
    }

    fn execute_pre_destroy(&self, instance: &Wizard) -> anyhow::Result<()> {
        self.log
            .lock()
            .push(format!("destroyed after {} steps", instance.steps.lock().len()));
        Ok(())
    }
}

#[derive(Default)]
struct CountingObserver {
    destroyed: AtomicUsize,
}

#[async_trait]
impl ConversationObserver for CountingObserver {
    async fn on_conversation_destroyed(&self, _event: &ConversationEvent) -> Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handles one request: restores the conversation named by its `cid` parameter and
/// runs `step` against it.
async fn handle<F>(
    context: &ConversationContext<InMemoryStorage>,
    request: MemoryRequest,
    step: F,
) -> Result<ActivationOutcome>
where
    F: FnOnce(&ConversationContext<InMemoryStorage>, &mut ExecutionScope<MemoryRequest>) -> Result<()>,
{
    let mut scope = ExecutionScope::new();
    context.associate(&mut scope, request.clone())?;
    context.invalidate(&scope)?;

    let cid = context.requested_conversation_id(&request);
    let outcome = context.activate(&mut scope, cid.as_deref()).await?;
    let result = step(context, &mut scope);

    context.deactivate(&mut scope).await?;
    context.dissociate(&mut scope, &request)?;
    result.map(|_| outcome)
}

fn wizard_bean(log: &Arc<Mutex<Vec<String>>>) -> ConversationScopedBean<Wizard> {
    let interceptor = Arc::new(AuditInterceptor {
        log: Arc::clone(log),
    });
    ConversationScopedBean::new(
        "wizard",
        FnInstantiator::new(|| Ok(Wizard::default())).with_interceptor(interceptor),
    )
}

#[tokio::test]
async fn test_multi_step_wizard() {
    let storage = Arc::new(InMemoryStorage::new());
    let observer = Arc::new(CountingObserver::default());
    let context = ConversationContext::new(Arc::clone(&storage), ConversationConfig::default())
        .with_observer(observer.clone());
    let log = Arc::new(Mutex::new(Vec::new()));
    let bean = wizard_bean(&log);

    let first = storage.request();
    let cid = Arc::new(Mutex::new(String::new()));
    let outcome = handle(&context, first.clone(), |context, scope| {
        let wizard = context.get_or_create(scope, &bean)?;
        wizard.steps.lock().push("address".to_string());
        *cid.lock() = context.begin_conversation(scope, None)?;
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(outcome, ActivationOutcome::Started);

    let cid = cid.lock().clone();
    let session_id = first.session_id().unwrap();

    let second = storage
        .request_for_session(&session_id)
        .with_parameter("cid", cid.as_str());
    let outcome = handle(&context, second, |context, scope| {
        let wizard = context.get_or_create(scope, &bean)?;
        wizard.steps.lock().push("payment".to_string());
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(outcome, ActivationOutcome::Restored { cid: cid.clone() });

    let last = storage
        .request_for_session(&session_id)
        .with_parameter("cid", cid.as_str());
    handle(&context, last, |context, scope| {
        let wizard = context.get::<Wizard>(scope, "wizard")?.unwrap();
        assert_eq!(
            *wizard.steps.lock(),
            vec!["address".to_string(), "payment".to_string()]
        );
        context.end_conversation(scope)
    })
    .await
    .unwrap();

    assert_eq!(
        *log.lock(),
        vec!["created".to_string(), "destroyed after 2 steps".to_string()]
    );
    assert_eq!(observer.destroyed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_conversation_is_gone_on_next_request() {
    let storage = Arc::new(InMemoryStorage::new());
    let config = ConfigBuilder::new()
        .default_timeout(Duration::from_millis(20))
        .build();
    let context = ConversationContext::new(Arc::clone(&storage), config);
    let log = Arc::new(Mutex::new(Vec::new()));
    let bean = wizard_bean(&log);

    let first = storage.request();
    let cid = Arc::new(Mutex::new(String::new()));
    handle(&context, first.clone(), |context, scope| {
        context.get_or_create(scope, &bean)?;
        *cid.lock() = context.begin_conversation(scope, None)?;
        Ok(())
    })
    .await
    .unwrap();
    let cid = cid.lock().clone();

    tokio::time::sleep(Duration::from_millis(60)).await;
    let session_id = first.session_id().unwrap();

    // the request that notices the expiry still sees the ended conversation
    let next = storage
        .request_for_session(&session_id)
        .with_parameter("cid", cid.as_str());
    handle(&context, next, |context, scope| {
        assert!(context.current_conversation(scope)?.is_transient());
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(
        *log.lock(),
        vec!["created".to_string(), "destroyed after 0 steps".to_string()]
    );

    let later = storage
        .request_for_session(&session_id)
        .with_parameter("cid", cid.as_str());
    let outcome = handle(&context, later, |_, _| Ok(())).await.unwrap();
    assert!(matches!(
        outcome.into_result(),
        Err(ConversationError::NonexistentConversation { .. })
    ));
}

#[tokio::test]
async fn test_session_end_destroys_conversations() {
    let storage = Arc::new(InMemoryStorage::new());
    let observer = Arc::new(CountingObserver::default());
    let context = ConversationContext::new(Arc::clone(&storage), ConversationConfig::default())
        .with_observer(observer.clone());
    let log = Arc::new(Mutex::new(Vec::new()));
    let bean = wizard_bean(&log);

    let first = storage.request();
    handle(&context, first.clone(), |context, scope| {
        context.get_or_create(scope, &bean)?;
        context.begin_conversation(scope, Some("signup"))?;
        Ok(())
    })
    .await
    .unwrap();

    let session = storage
        .remove_session(&first.session_id().unwrap())
        .unwrap();
    let mut scope = ExecutionScope::new();
    assert!(context.destroy(&mut scope, &session).await.unwrap());

    assert_eq!(observer.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(log.lock().len(), 2);
    assert!(!scope.is_active());
}

#[tokio::test]
async fn test_failing_step_still_releases_conversation() {
    let storage = Arc::new(InMemoryStorage::new());
    let context = ConversationContext::new(
        Arc::clone(&storage),
        ConfigBuilder::new()
            .concurrent_access_timeout(Duration::from_millis(50))
            .build(),
    );

    let first = storage.request();
    handle(&context, first.clone(), |context, scope| {
        context.begin_conversation(scope, Some("order")).map(|_| ())
    })
    .await
    .unwrap();
    let session_id = first.session_id().unwrap();

    let failing = storage
        .request_for_session(&session_id)
        .with_parameter("cid", "order");
    let err = handle(&context, failing, |_, _| {
        Err(ConversationError::Other("handler failed".to_string()))
    })
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "handler failed");

    let retry = storage
        .request_for_session(&session_id)
        .with_parameter("cid", "order");
    let outcome = handle(&context, retry, |_, _| Ok(())).await.unwrap();
    assert_eq!(
        outcome,
        ActivationOutcome::Restored {
            cid: "order".to_string()
        }
    );
}

#[tokio::test]
async fn test_context_configured_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
parameter_name = "conversation"
default_timeout = "5m"
concurrent_access_timeout = "250ms"
"#
    )
    .unwrap();

    let config = ConversationConfig::from_file(file.path()).unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    let context = ConversationContext::new(Arc::clone(&storage), config);

    assert_eq!(context.default_timeout(), Duration::from_secs(300));
    assert_eq!(context.concurrent_access_timeout(), Duration::from_millis(250));

    let request = storage.request().with_parameter("conversation", "9");
    assert_eq!(context.requested_conversation_id(&request).as_deref(), Some("9"));
}

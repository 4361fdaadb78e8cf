//! Timeout, cancellation and async execution tests.

use std::time::{Duration, Instant};

use emberscript::{CancellationToken, GlobalRuntimeContext, RuntimeError, Script, ScriptError, Value};

const SCRIPT: &str = r#"
    global int ticks = 0;

    int Loop() { while (true) { } }
    int Twice(int n) { return n * 2; }
    void Tick() { ticks++; }
"#;

fn prepared() -> (Script, GlobalRuntimeContext, emberscript::ScriptRuntimeContext) {
    let script = Script::compile(SCRIPT).unwrap();
    let global = GlobalRuntimeContext::new();
    let context = script.prepare(&global).unwrap();
    (script, global, context)
}

#[tokio::test]
async fn test_async_timeout_cancels_infinite_loop() {
    let (script, _global, context) = prepared();

    let start = Instant::now();
    let result = script
        .execute_function_async::<i32>("Loop", Duration::from_millis(50), &context, vec![])
        .await;

    assert_eq!(result, Err(ScriptError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_external_token_cancels() {
    let (script, _global, context) = prepared();
    let external = CancellationToken::new();

    let canceller = {
        let external = external.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            external.cancel();
        })
    };

    let start = Instant::now();
    let result = script
        .execute_function_async_with_token::<i32>("Loop", Duration::from_secs(10), &external, &context, vec![])
        .await;
    canceller.await.unwrap();

    assert_eq!(result, Err(ScriptError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_async_call_returns_value() {
    let (script, _global, context) = prepared();

    let doubled = script
        .execute_function_async::<i64>("Twice", Duration::from_secs(5), &context, vec![Value::Int(21)])
        .await
        .unwrap();
    assert_eq!(doubled, 42);
}

#[tokio::test]
async fn test_async_void_call() {
    let (script, global, context) = prepared();

    script
        .execute_function_async::<()>("Tick", Duration::from_secs(5), &context, vec![])
        .await
        .unwrap();
    assert_eq!(global.raw_value("ticks"), Some(Value::Int(1)));
}

#[tokio::test]
async fn test_context_busy_while_call_runs() {
    let (script, _global, context) = prepared();
    let external = CancellationToken::new();

    let running = {
        let script = script.clone();
        let context = context.clone();
        let external = external.clone();
        tokio::spawn(async move {
            script
                .execute_function_async_with_token::<i32>("Loop", Duration::from_secs(10), &external, &context, vec![])
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let busy = script.execute_function("Twice", &context, vec![Value::Int(1)]);
    assert_eq!(busy, Err(ScriptError::Runtime(RuntimeError::ContextBusy)));

    external.cancel();
    assert_eq!(running.await.unwrap(), Err(ScriptError::Cancelled));

    assert_eq!(
        script.execute_function("Twice", &context, vec![Value::Int(4)]).unwrap(),
        Some(Value::Int(8))
    );
}

#[test]
fn test_sync_timeout() {
    let (script, _global, context) = prepared();

    let result = script.execute_function_with_timeout::<i32>("Loop", Duration::from_millis(30), &context, vec![]);
    assert!(result.unwrap_err().is_cancelled());

    let doubled: i32 = script
        .execute_function_with_timeout("Twice", Duration::from_secs(5), &context, vec![Value::Int(3)])
        .unwrap();
    assert_eq!(doubled, 6);
}

#[test]
fn test_pre_cancelled_token() {
    let (script, global, context) = prepared();
    let token = CancellationToken::new();
    token.cancel();

    let result = script.execute_function_with_token("Tick", &token, &context, vec![]);
    assert_eq!(result, Err(ScriptError::Cancelled));
    assert_eq!(global.raw_value("ticks"), Some(Value::Int(0)));
}

#[test]
fn test_block_on_async_call() {
    let (script, _global, context) = prepared();

    let result = tokio_test::block_on(script.execute_function_async::<i32>(
        "Twice",
        Duration::from_secs(5),
        &context,
        vec![Value::Int(5)],
    ));
    assert_eq!(result, Ok(10));
}

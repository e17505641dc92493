use super::test_utils::*;
use super::*;
use crate::llm::{Role, ToolChoice};
use crate::models::{MODEL_MISTRAL_LARGE, MODEL_OPEN_MISTRAL_7B};
use crate::types::RetryConfig;
use serde_json::json;

fn stock_schema() -> ToolSchemaProvider {
    let mut registry = ToolRegistry::new();
    registry.register(StubStockTool);
    ToolSchemaProvider::from_descriptors(registry.descriptors()).unwrap()
}

fn chat(provider: MockProvider) -> ResponseLoop<MockProvider> {
    chat_with_config(provider, ChatConfig::default())
}

fn chat_with_config(provider: MockProvider, config: ChatConfig) -> ResponseLoop<MockProvider> {
    let mut registry = ToolRegistry::new();
    registry.register(StubStockTool);
    ResponseLoop::builder(provider)
        .tools(registry)
        .schema(stock_schema())
        .config(ChatConfig {
            retry: RetryConfig::fast(),
            ..config
        })
        .build()
}

fn tool_session(chat: &ResponseLoop<MockProvider>) -> Session {
    let mut session = chat.new_session();
    session.set_model(MODEL_MISTRAL_LARGE, chat.models()).unwrap();
    session
}

fn visible(session: &Session) -> Vec<(Role, String)> {
    session
        .visible_messages()
        .map(|m| (m.role, m.content.clone()))
        .collect()
}

// ===================
// Text Turns
// ===================

#[tokio::test]
async fn test_text_turn_concatenates_fragments() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![MockProvider::text_response(&[
        "Hel", "lo",
    ])]));
    let mut session = chat.new_session();

    let outcome = chat.run_turn(&mut session, "Hi", None).await?;

    assert_eq!(outcome.text, "Hello");
    assert_eq!(outcome.model_calls, 1);
    assert_eq!(outcome.tool_calls, 0);
    assert_eq!(outcome.usage.output_tokens, 20);
    assert!(!outcome.echoed_tool_result);
    assert_eq!(
        visible(&session),
        vec![
            (Role::User, "Hi".to_string()),
            (Role::Assistant, "Hello".to_string())
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_system_prompt_sent_but_not_visible() -> anyhow::Result<()> {
    let provider = MockProvider::new(vec![MockProvider::text_response(&["Hello"])]);
    let chat = chat_with_config(
        provider,
        ChatConfig {
            system_prompt: "You are Tasuku.".to_string(),
            ..ChatConfig::default()
        },
    );
    let mut session = chat.new_session();

    chat.run_turn(&mut session, "Hi", None).await?;

    let request = &chat.provider.requests()[0];
    assert_eq!(request.messages[0].role, Role::System);
    assert_eq!(request.messages[0].content, "You are Tasuku.");
    assert!(session.visible_messages().all(|m| m.role != Role::System));
    assert_eq!(session.conversation().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_history_accumulates_across_turns() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![
        MockProvider::text_response(&["First"]),
        MockProvider::text_response(&["Second"]),
    ]));
    let mut session = chat.new_session();

    chat.run_turn(&mut session, "one", None).await?;
    chat.run_turn(&mut session, "two", None).await?;

    let second_request = &chat.provider.requests()[1];
    assert_eq!(second_request.messages.len(), 3);
    assert_eq!(visible(&session).len(), 4);
    assert_eq!(visible(&session)[3].1, "Second");
    Ok(())
}

// ===================
// Tool Availability
// ===================

#[tokio::test]
async fn test_tools_omitted_for_model_without_tool_support() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![MockProvider::text_response(&["ok"])]));
    let mut session = chat.new_session();
    assert_eq!(session.model(), MODEL_OPEN_MISTRAL_7B);

    chat.run_turn(&mut session, "Hi", None).await?;

    let request = &chat.provider.requests()[0];
    assert!(request.tools.is_none());
    assert!(request.tool_choice.is_none());
    Ok(())
}

#[tokio::test]
async fn test_tools_sent_for_tool_capable_model() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![MockProvider::text_response(&["ok"])]));
    let mut session = tool_session(&chat);

    chat.run_turn(&mut session, "Hi", None).await?;

    let request = &chat.provider.requests()[0];
    let tools = request.tools.as_ref().expect("tools should be sent");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].function.name, "get_stock_price");
    assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
    Ok(())
}

#[tokio::test]
async fn test_tools_omitted_when_schema_is_empty() -> anyhow::Result<()> {
    let provider = MockProvider::new(vec![MockProvider::text_response(&["ok"])]);
    let chat = ResponseLoop::builder(provider).build();
    let mut session = tool_session(&chat);

    chat.run_turn(&mut session, "Hi", None).await?;

    assert!(chat.provider.requests()[0].tools.is_none());
    Ok(())
}

// ===================
// Tool Dispatch
// ===================

#[tokio::test]
async fn test_stock_lookup_leaves_user_and_assistant_only() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![
        MockProvider::tool_call_response("D681PevKs", "get_stock_price", json!({"ticker": "AAPL"})),
        MockProvider::text_response(&["Apple closed at ", "123.45 USD."]),
    ]));
    let mut session = tool_session(&chat);

    let outcome = chat
        .run_turn(&mut session, "What is the price of AAPL?", None)
        .await?;

    assert_eq!(outcome.text, "Apple closed at 123.45 USD.");
    assert_eq!(outcome.tool_calls, 1);
    assert_eq!(outcome.model_calls, 2);
    assert_eq!(
        visible(&session),
        vec![
            (Role::User, "What is the price of AAPL?".to_string()),
            (Role::Assistant, "Apple closed at 123.45 USD.".to_string()),
        ]
    );
    assert!(!session.conversation().has_ephemeral());

    // The second call saw the invocation and its result.
    let second = &chat.provider.requests()[1];
    let n = second.messages.len();
    let invocation = &second.messages[n - 2];
    assert_eq!(invocation.role, Role::Assistant);
    assert_eq!(invocation.tool_calls[0].id, "D681PevKs");
    assert_eq!(invocation.tool_calls[0].arguments["ticker"], "AAPL");
    let result = &second.messages[n - 1];
    assert_eq!(result.role, Role::Tool);
    assert_eq!(result.name.as_deref(), Some("get_stock_price"));
    assert_eq!(result.tool_call_id.as_deref(), Some("D681PevKs"));
    assert_eq!(result.content, "The latest closing price is 123.45 USD");
    Ok(())
}

#[tokio::test]
async fn test_unknown_tool_result_fed_back_then_apology() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![
        MockProvider::tool_call_response("call_x", "delete_everything", json!({})),
        MockProvider::text_response(&["Sorry, I can't do that."]),
    ]));
    let mut session = tool_session(&chat);

    let outcome = chat.run_turn(&mut session, "Delete everything", None).await?;

    assert_eq!(outcome.text, "Sorry, I can't do that.");
    let second = &chat.provider.requests()[1];
    let result = second.messages.last().unwrap();
    assert_eq!(result.role, Role::Tool);
    assert!(result.content.starts_with("Error: Unknown tool: delete_everything"));
    assert_eq!(visible(&session).len(), 2);
    assert!(!session.conversation().has_ephemeral());
    Ok(())
}

#[tokio::test]
async fn test_text_before_tool_call_is_discarded() -> anyhow::Result<()> {
    let mut pass = vec![crate::llm::StreamDelta::TextDelta {
        delta: "Let me check. ".to_string(),
    }];
    pass.extend(MockProvider::tool_call_response(
        "c1",
        "get_stock_price",
        json!({"ticker": "MSFT"}),
    ));
    let chat = chat(MockProvider::new(vec![
        pass,
        MockProvider::text_response(&["MSFT is at 123.45 USD."]),
    ]));
    let mut session = tool_session(&chat);

    let outcome = chat.run_turn(&mut session, "MSFT?", None).await?;

    assert_eq!(outcome.text, "MSFT is at 123.45 USD.");
    assert!(
        session
            .conversation()
            .messages()
            .iter()
            .all(|m| !m.content.contains("Let me check"))
    );
    Ok(())
}

#[tokio::test]
async fn test_echoed_tool_result_is_recorded_and_flagged() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![
        MockProvider::tool_call_response("c1", "get_stock_price", json!({"ticker": "AAPL"})),
        MockProvider::text_response(&["The latest closing price is 123.45 USD"]),
    ]));
    let mut session = tool_session(&chat);

    let outcome = chat.run_turn(&mut session, "AAPL?", None).await?;

    assert!(outcome.echoed_tool_result);
    assert_eq!(
        visible(&session)[1],
        (
            Role::Assistant,
            "The latest closing price is 123.45 USD".to_string()
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_two_tool_calls_then_text() -> anyhow::Result<()> {
    let mut registry = ToolRegistry::new();
    registry.register(StubStockTool).register(StubTodoTool);
    let schema = ToolSchemaProvider::from_descriptors(registry.descriptors())?;
    let provider = MockProvider::new(vec![
        MockProvider::tool_call_response("c1", "get_stock_price", json!({"ticker": "AAPL"})),
        MockProvider::tool_call_response("c2", "save_todo", json!({"task": "sell AAPL"})),
        MockProvider::text_response(&["Noted, AAPL is at 123.45 USD."]),
    ]);
    let chat = ResponseLoop::builder(provider)
        .tools(registry)
        .schema(schema)
        .config(ChatConfig {
            system_prompt: "You are Tasuku.".to_string(),
            retry: RetryConfig::no_retry(),
            ..ChatConfig::default()
        })
        .build();
    let mut session = tool_session(&chat);

    let outcome = chat
        .run_turn(&mut session, "Check AAPL and remind me to sell", None)
        .await?;

    assert_eq!(outcome.tool_calls, 2);
    assert_eq!(outcome.model_calls, 3);

    let third = &chat.provider.requests()[2];
    let ephemeral: Vec<_> = third.messages.iter().filter(|m| m.ephemeral).collect();
    assert_eq!(ephemeral.len(), 4);
    assert_eq!(
        ephemeral.iter().map(|m| m.role).collect::<Vec<_>>(),
        vec![Role::Assistant, Role::Tool, Role::Assistant, Role::Tool]
    );
    assert_eq!(ephemeral[1].name.as_deref(), Some("get_stock_price"));
    assert_eq!(ephemeral[3].content, "Saved task sell AAPL");

    let history: Vec<_> = session
        .conversation()
        .messages()
        .iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(history, vec![Role::System, Role::User, Role::Assistant]);
    assert!(!session.conversation().has_ephemeral());
    Ok(())
}

#[tokio::test]
async fn test_tools_missing_from_schema_cannot_be_called() -> anyhow::Result<()> {
    let mut registry = ToolRegistry::new();
    registry.register(StubStockTool).register(StubTodoTool);
    let chat = ResponseLoop::builder(MockProvider::new(vec![
        MockProvider::tool_call_response("c1", "save_todo", json!({"task": "x"})),
        MockProvider::text_response(&["ok"]),
    ]))
    .tools(registry)
    .schema(stock_schema())
    .config(ChatConfig {
        retry: RetryConfig::no_retry(),
        ..ChatConfig::default()
    })
    .build();
    let mut session = tool_session(&chat);

    assert_eq!(chat.tools().names(), vec!["get_stock_price"]);
    chat.run_turn(&mut session, "remember x", None).await?;

    let second = &chat.provider.requests()[1];
    let result = second.messages.last().unwrap();
    assert!(result.content.starts_with("Error: Unknown tool: save_todo"));
    Ok(())
}

#[tokio::test]
async fn test_tool_loop_limit() {
    let calls = (0..5)
        .map(|i| {
            MockProvider::tool_call_response(
                &format!("c{i}"),
                "get_stock_price",
                json!({"ticker": "AAPL"}),
            )
        })
        .collect();
    let chat = chat_with_config(
        MockProvider::new(calls),
        ChatConfig {
            max_tool_iterations: 2,
            ..ChatConfig::default()
        },
    );
    let mut session = tool_session(&chat);

    let err = chat.run_turn(&mut session, "loop", None).await.unwrap_err();

    assert!(matches!(err, TurnError::ToolLoopLimit { limit: 2 }));
    assert_eq!(chat.provider.call_count(), 3);
    assert_eq!(visible(&session), vec![(Role::User, "loop".to_string())]);
    assert!(!session.conversation().has_ephemeral());
}

// ===================
// Failures
// ===================

#[tokio::test]
async fn test_protocol_error_restores_consistent_history() {
    let chat = chat(MockProvider::new(vec![
        MockProvider::tool_call_response("c1", "get_stock_price", json!({"ticker": "AAPL"})),
        MockProvider::raw_tool_call_response("c2", "get_stock_price", "[\"AAPL\"]"),
    ]));
    let mut session = tool_session(&chat);

    let err = chat.run_turn(&mut session, "AAPL?", None).await.unwrap_err();

    assert!(matches!(err, TurnError::StreamProtocol(_)));
    assert_eq!(visible(&session), vec![(Role::User, "AAPL?".to_string())]);
    assert!(!session.conversation().has_ephemeral());
}

#[tokio::test]
async fn test_recoverable_error_is_retried() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![
        MockProvider::error_response("Rate limited", true),
        MockProvider::text_response(&["Hello"]),
    ]));
    let mut session = chat.new_session();

    let outcome = chat.run_turn(&mut session, "Hi", None).await?;

    assert_eq!(outcome.text, "Hello");
    assert_eq!(chat.provider.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_retries_exhausted() {
    let chat = chat(MockProvider::new(vec![
        MockProvider::error_response("overloaded", true),
        MockProvider::error_response("overloaded", true),
        MockProvider::error_response("overloaded", true),
        MockProvider::error_response("overloaded", true),
        MockProvider::text_response(&["never"]),
    ]));
    let mut session = chat.new_session();

    let err = chat.run_turn(&mut session, "Hi", None).await.unwrap_err();

    assert!(matches!(err, TurnError::Endpoint { retryable: false, .. }));
    assert_eq!(chat.provider.call_count(), 4);
    assert_eq!(visible(&session), vec![(Role::User, "Hi".to_string())]);
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let chat = chat(MockProvider::new(vec![MockProvider::error_response(
        "invalid model",
        false,
    )]));
    let mut session = chat.new_session();

    let err = chat.run_turn(&mut session, "Hi", None).await.unwrap_err();

    assert!(matches!(err, TurnError::Endpoint { .. }));
    assert_eq!(chat.provider.call_count(), 1);
}

#[tokio::test]
async fn test_error_after_partial_text_not_retried() {
    let mut partial = vec![crate::llm::StreamDelta::TextDelta {
        delta: "Hel".to_string(),
    }];
    partial.extend(MockProvider::error_response("connection dropped", true));
    let chat = chat(MockProvider::new(vec![
        partial,
        MockProvider::text_response(&["Hello"]),
    ]));
    let mut session = chat.new_session();

    let err = chat.run_turn(&mut session, "Hi", None).await.unwrap_err();

    assert!(matches!(err, TurnError::Endpoint { .. }));
    assert_eq!(chat.provider.call_count(), 1);
}

// ===================
// Events
// ===================

#[tokio::test]
async fn test_events_emitted_in_order() -> anyhow::Result<()> {
    let chat = chat(MockProvider::new(vec![
        MockProvider::tool_call_response("c1", "get_stock_price", json!({"ticker": "AAPL"})),
        MockProvider::text_response(&["Hel", "lo"]),
    ]));
    let mut session = tool_session(&chat);
    let (tx, mut rx) = mpsc::channel(32);

    chat.run_turn(&mut session, "AAPL?", Some(&tx)).await?;
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(&events[0], ChatEvent::ToolCallStart { name, input, .. }
        if name == "get_stock_price" && input["ticker"] == "AAPL"));
    assert!(matches!(&events[1], ChatEvent::ToolCallEnd { result, .. } if result.success));
    assert_eq!(events[2], ChatEvent::text_delta("Hel"));
    assert_eq!(events[3], ChatEvent::text_delta("lo"));
    assert!(matches!(&events[4], ChatEvent::Done { text, model_calls: 2, .. } if text == "Hello"));
    assert_eq!(events.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_error_event_on_failure() {
    let chat = chat(MockProvider::new(vec![MockProvider::error_response(
        "bad request",
        false,
    )]));
    let mut session = chat.new_session();
    let (tx, mut rx) = mpsc::channel(8);

    let _ = chat.run_turn(&mut session, "Hi", Some(&tx)).await;
    drop(tx);

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, ChatEvent::Error { message } if message.contains("bad request")));
}

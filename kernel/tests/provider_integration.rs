//! HTTP-mocked coverage of spec §8 scenarios 2, 4, and 5 — the three
//! end-to-end scenarios that need a real request/response round trip rather
//! than the in-memory-only checks in `end_to_end.rs`.

use deepweb_kernel::config::KernelConfig;
use deepweb_kernel::credential_vault::{ CredentialVault, InMemorySecretStore };
use deepweb_kernel::dispatcher::{ DispatchRequest, Dispatcher, PageContext };
use deepweb_kernel::policy_gate::PolicyGate;
use deepweb_kernel::provider_registry::anthropic::AnthropicProvider;
use deepweb_kernel::provider_registry::cost::compute_cost;
use deepweb_kernel::provider_registry::deepseek::DeepSeekProvider;
use deepweb_kernel::provider_registry::registry::ProviderRegistry;
use deepweb_kernel::provider_registry::types::{ ChatParameters, ChatRequest };
use deepweb_kernel::storage_engine::engine::{ StorageEngine, StorageEngineLimits };
use deepweb_kernel::storage_engine::message::MessageRole;
use deepweb_kernel::storage_engine::store::InMemoryStore;
use deepweb_kernel::stream_controller::StreamController;
use secrecy::ExposeSecret;
use std::sync::Arc;
use wiremock::matchers::{ method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

fn limits() -> StorageEngineLimits
{
  StorageEngineLimits
  {
    cache_capacity : 50,
    max_conversations : 1_000,
    eviction_batch_size : 50,
    archive_after_days : 30,
    soft_quota_fraction : 0.8,
    max_title_chars : 200,
    max_stored_message_chars : 100_000,
  }
}

async fn vault_with_key( provider : &str, key : &str ) -> Arc< CredentialVault >
{
  let vault = Arc::new( CredentialVault::new( Arc::new( InMemorySecretStore::default() ), 100 ) );
  vault.initialize().await.unwrap();
  vault.store( provider, key ).await.unwrap();
  vault
}

#[ tokio::test ]
async fn round_trip_chat_persists_both_turns_and_computes_the_spec_example_cost()
{
  // spec §8 scenario 2
  let mock_server = MockServer::start().await;
  Mock::given( method( "POST" ) )
    .and( path( "/chat/completions" ) )
    .respond_with( ResponseTemplate::new( 200 ).set_body_json( serde_json::json!(
    {
      "choices" : [ { "message" : { "content" : "hi there" }, "delta" : null, "finish_reason" : "stop" } ],
      "usage" : null,
    } ) ) )
    .mount( &mock_server )
    .await;

  let config = KernelConfig::default();
  let vault = vault_with_key( "deepseek", &format!( "sk-{}", "a".repeat( 40 ) ) ).await;
  let storage_engine = Arc::new( StorageEngine::new( Arc::new( InMemoryStore::default() ), limits() ) );
  let provider_registry = Arc::new( ProviderRegistry::with_providers(
    vec![ Arc::new( DeepSeekProvider::new( config.request_timeout_ms ).with_base_url( mock_server.uri() ) ) ],
    config.max_retry_attempts, config.backoff_cap_ms, config.backoff_jitter,
  ) );

  let dispatcher = Dispatcher::new(
    Arc::new( PolicyGate::new( config.rate_limit_window_ms, config.rate_ledger_max_age_ms, config.max_message_chars ) ),
    vault,
    Arc::clone( &storage_engine ),
    provider_registry,
    config.history_window,
  );

  let request = DispatchRequest
  {
    client_id : "tab-1".into(),
    conversation_id : None,
    model : "deepseek-chat".into(),
    system_prompt : None,
    message : "hi".into(),
    parameters : ChatParameters::default(),
    context : PageContext::default(),
  };

  let reply = dispatcher.chat( &request ).await.unwrap();
  assert_eq!( reply.content, "hi there" );
  assert!( ( reply.cost - 0.00014 ).abs() < 1e-9 );

  let messages = storage_engine.list_messages( &reply.conversation_id, &Default::default() ).await.unwrap();
  assert_eq!( messages.len(), 2 );
  assert_eq!( messages[ 0 ].role, MessageRole::User );
  assert_eq!( messages[ 1 ].role, MessageRole::Assistant );

  let conversation = storage_engine.get_conversation( &reply.conversation_id ).await.unwrap();
  assert!( ( conversation.metadata.total_cost - 0.00014 ).abs() < 1e-9 );
}

#[ tokio::test ]
async fn provider_auth_failure_maps_to_credential_invalid_without_an_assistant_message()
{
  // spec §8 scenario 5
  let mock_server = MockServer::start().await;
  Mock::given( method( "POST" ) )
    .and( path( "/v1/messages" ) )
    .respond_with( ResponseTemplate::new( 401 ) )
    .mount( &mock_server )
    .await;

  let config = KernelConfig::default();
  let vault = vault_with_key( "anthropic", &format!( "sk-ant-{}", "z".repeat( 40 ) ) ).await;
  let storage_engine = Arc::new( StorageEngine::new( Arc::new( InMemoryStore::default() ), limits() ) );
  let provider_registry = Arc::new( ProviderRegistry::with_providers(
    vec![ Arc::new( AnthropicProvider::new( config.request_timeout_ms ).with_base_url( mock_server.uri() ) ) ],
    config.max_retry_attempts, config.backoff_cap_ms, config.backoff_jitter,
  ) );

  let dispatcher = Dispatcher::new(
    Arc::new( PolicyGate::new( config.rate_limit_window_ms, config.rate_ledger_max_age_ms, config.max_message_chars ) ),
    vault,
    Arc::clone( &storage_engine ),
    provider_registry,
    config.history_window,
  );

  let request = DispatchRequest
  {
    client_id : "tab-1".into(),
    conversation_id : None,
    model : "claude-3-haiku-20240307".into(),
    system_prompt : None,
    message : "hi".into(),
    parameters : ChatParameters::default(),
    context : PageContext::default(),
  };

  let err = dispatcher.chat( &request ).await.unwrap_err();
  assert_eq!( err.kind(), "credential_invalid" );

  let ( conversations, _total ) = storage_engine.list_conversations( &Default::default() ).await.unwrap();
  let conversation = conversations.into_iter().next().unwrap();
  let messages = storage_engine.list_messages( &conversation.id, &Default::default() ).await.unwrap();
  assert_eq!( messages.len(), 1 );
  assert_eq!( messages[ 0 ].role, MessageRole::User );
  assert!( ( conversation.metadata.total_cost ).abs() < f64::EPSILON );
}

#[ tokio::test ]
async fn stream_cancellation_keeps_the_partial_content_out_of_storage()
{
  // spec §8 scenario 4
  let mock_server = MockServer::start().await;
  let sse_body = concat!(
    "data: {\"choices\":[{\"message\":null,\"delta\":{\"content\":\"Once\"},\"finish_reason\":null}],\"usage\":null}\n\n",
    "data: {\"choices\":[{\"message\":null,\"delta\":{\"content\":\" upon\"},\"finish_reason\":null}],\"usage\":null}\n\n",
    "data: [DONE]\n\n",
  );
  Mock::given( method( "POST" ) )
    .and( path( "/chat/completions" ) )
    .respond_with(
      ResponseTemplate::new( 200 )
        .insert_header( "content-type", "text/event-stream" )
        .set_body_raw( sse_body, "text/event-stream" ),
    )
    .mount( &mock_server )
    .await;

  let config = KernelConfig::default();
  let vault = vault_with_key( "deepseek", &format!( "sk-{}", "a".repeat( 40 ) ) ).await;
  let storage_engine = Arc::new( StorageEngine::new( Arc::new( InMemoryStore::default() ), limits() ) );
  let provider_registry = Arc::new( ProviderRegistry::with_providers(
    vec![ Arc::new( DeepSeekProvider::new( config.request_timeout_ms ).with_base_url( mock_server.uri() ) ) ],
    config.max_retry_attempts, config.backoff_cap_ms, config.backoff_jitter,
  ) );

  let dispatcher = Arc::new( Dispatcher::new(
    Arc::new( PolicyGate::new( config.rate_limit_window_ms, config.rate_ledger_max_age_ms, config.max_message_chars ) ),
    vault,
    Arc::clone( &storage_engine ),
    Arc::clone( &provider_registry ),
    config.history_window,
  ) );

  let controller = Arc::new( StreamController::new(
    dispatcher,
    provider_registry,
    Arc::clone( &storage_engine ),
    config.max_reconnect_attempts,
    config.backoff_cap_ms,
    config.backoff_jitter,
  ) );

  let conversation = storage_engine.create_conversation( None, Default::default() ).await.unwrap();
  let request = DispatchRequest
  {
    client_id : "tab-2".into(),
    conversation_id : Some( conversation.id.clone() ),
    model : "deepseek-chat".into(),
    system_prompt : None,
    message : "tell me a story".into(),
    parameters : ChatParameters::default(),
    context : PageContext::default(),
  };

  let ( stream_id, mut events ) = Arc::clone( &controller ).start_stream( request ).await.unwrap();

  use futures_util::StreamExt;
  use deepweb_kernel::stream_controller::StreamEvent;

  // Drain events until the first content delta, then cancel.
  loop
  {
    match events.next().await.unwrap()
    {
      StreamEvent::Content { .. } => break,
      StreamEvent::Started { .. } => continue,
      other => panic!( "unexpected event before first content delta : {other:?}" ),
    }
  }
  controller.cancel_stream( &stream_id );

  let mut saw_cancelled = false;
  while let Some( event ) = events.next().await
  {
    if let StreamEvent::Cancelled { content } = event
    {
      assert!( content.contains( "Once" ) );
      saw_cancelled = true;
      break;
    }
  }
  assert!( saw_cancelled, "expected a Cancelled terminal event" );

  let ( conversations, _total ) = storage_engine.list_conversations( &Default::default() ).await.unwrap();
  let conversation = conversations.into_iter().next().unwrap();
  let messages = storage_engine.list_messages( &conversation.id, &Default::default() ).await.unwrap();
  assert_eq!( messages.len(), 1 );
  assert_eq!( messages[ 0 ].role, MessageRole::User );
}

#[ tokio::test ]
async fn starting_a_second_stream_for_the_same_client_and_conversation_cancels_the_first()
{
  let mock_server = MockServer::start().await;
  let sse_body = concat!(
    "data: {\"choices\":[{\"message\":null,\"delta\":{\"content\":\"hi\"},\"finish_reason\":null}],\"usage\":null}\n\n",
    "data: [DONE]\n\n",
  );
  Mock::given( method( "POST" ) )
    .and( path( "/chat/completions" ) )
    .respond_with(
      ResponseTemplate::new( 200 )
        .insert_header( "content-type", "text/event-stream" )
        .set_body_raw( sse_body, "text/event-stream" ),
    )
    .mount( &mock_server )
    .await;

  let config = KernelConfig::default();
  let vault = vault_with_key( "deepseek", &format!( "sk-{}", "a".repeat( 40 ) ) ).await;
  let storage_engine = Arc::new( StorageEngine::new( Arc::new( InMemoryStore::default() ), limits() ) );
  let provider_registry = Arc::new( ProviderRegistry::with_providers(
    vec![ Arc::new( DeepSeekProvider::new( config.request_timeout_ms ).with_base_url( mock_server.uri() ) ) ],
    config.max_retry_attempts, config.backoff_cap_ms, config.backoff_jitter,
  ) );

  let dispatcher = Arc::new( Dispatcher::new(
    Arc::new( PolicyGate::new( config.rate_limit_window_ms, config.rate_ledger_max_age_ms, config.max_message_chars ) ),
    vault,
    Arc::clone( &storage_engine ),
    Arc::clone( &provider_registry ),
    config.history_window,
  ) );

  let controller = Arc::new( StreamController::new(
    dispatcher,
    provider_registry,
    Arc::clone( &storage_engine ),
    config.max_reconnect_attempts,
    config.backoff_cap_ms,
    config.backoff_jitter,
  ) );

  let conversation = storage_engine.create_conversation( None, Default::default() ).await.unwrap();

  let request = | | DispatchRequest
  {
    client_id : "tab-3".into(),
    conversation_id : Some( conversation.id.clone() ),
    model : "deepseek-chat".into(),
    system_prompt : None,
    message : "first".into(),
    parameters : ChatParameters::default(),
    context : PageContext::default(),
  };

  let ( first_id, _first_events ) = Arc::clone( &controller ).start_stream( request() ).await.unwrap();
  let ( second_id, _second_events ) = Arc::clone( &controller ).start_stream( request() ).await.unwrap();

  assert_ne!( first_id, second_id );
  // Cancelling the first again must be a no-op, not a panic, since
  // `start_stream` already cancelled it implicitly.
  controller.cancel_stream( &first_id );
}

#[ tokio::test ]
async fn deepseek_wire_response_decodes_through_a_mocked_http_round_trip()
{
  let mock_server = MockServer::start().await;
  Mock::given( method( "POST" ) )
    .and( path( "/chat/completions" ) )
    .respond_with( ResponseTemplate::new( 200 ).set_body_json( serde_json::json!(
    {
      "choices" : [ { "message" : { "content" : "pong" }, "delta" : null, "finish_reason" : "stop" } ],
      "usage" : { "prompt_tokens" : 10, "completion_tokens" : 2 },
    } ) ) )
    .mount( &mock_server )
    .await;

  let provider = DeepSeekProvider::new( 5_000 ).with_base_url( mock_server.uri() );
  let api_key = secrecy::SecretString::new( "sk-anything".to_string().into_boxed_str() );
  let request = ChatRequest
  {
    model : "deepseek-chat".into(),
    system_prompt : None,
    prior_turns : Vec::new(),
    user_message : "ping".into(),
    parameters : ChatParameters::default(),
  };

  let reply = deepweb_kernel::provider_registry::types::Provider::chat( &provider, &api_key, &request ).await.unwrap();
  assert_eq!( reply.content, "pong" );
  assert_eq!( reply.usage.total(), 12 );
  assert!( ( reply.cost - compute_cost( reply.usage, "deepseek-chat" ) ).abs() < f64::EPSILON );
  let _ = api_key.expose_secret();
}

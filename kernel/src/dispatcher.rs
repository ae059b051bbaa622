mod private
{
  use crate::credential_vault::CredentialVault;
  use crate::error::{ KernelError, Result };
  use crate::policy_gate::PolicyGate;
  use crate::provider_registry::registry::ProviderRegistry;
  use crate::provider_registry::types::{ ChatParameters, ChatReply, ChatRequest, ChatTurn };
  use crate::storage_engine::conversation::ConversationMetadata;
  use crate::storage_engine::engine::StorageEngine;
  use crate::storage_engine::message::{ Message, MessageListQuery, MessageMetadata, MessageRole, NewMessage };
  use std::sync::Arc;

  /// Page context the UI extracted from the tab the request originated from
  /// (spec §4.5, `RequestContext.pageContext`).
  #[ derive( Debug, Clone, Default ) ]
  pub struct PageContext
  {
    /// Page URL.
    pub url : Option< String >,
    /// Page title.
    pub title : Option< String >,
    /// Extracted content summary, or the full content when short enough.
    pub content : Option< String >,
    /// A relevance score the UI assigned to the extraction, 0.0–1.0.
    pub relevance_score : Option< f32 >,
  }

  impl PageContext
  {
    fn is_empty( &self ) -> bool
    {
      self.url.is_none() && self.title.is_none() && self.content.is_none()
    }

    /// Renders the URL/title/content/score block the dispatcher prepends to
    /// the user's first turn in a conversation (spec §4.5 step 6).
    fn render_block( &self ) -> String
    {
      let mut lines = Vec::new();
      if let Some( url ) = &self.url
      {
        lines.push( format!( "URL: {url}" ) );
      }
      if let Some( title ) = &self.title
      {
        lines.push( format!( "Title: {title}" ) );
      }
      if let Some( content ) = &self.content
      {
        lines.push( format!( "Page content: {content}" ) );
      }
      if let Some( score ) = self.relevance_score
      {
        lines.push( format!( "Relevance: {score:.2}" ) );
      }
      lines.join( "\n" )
    }
  }

  /// One fully resolved `chat` request, already past sanitization (spec §4.5,
  /// `RequestContext`).
  #[ derive( Debug, Clone ) ]
  pub struct DispatchRequest
  {
    /// Sender tab/client identifier, for rate limiting.
    pub client_id : String,
    /// Target conversation; `None` synthesizes a new one.
    pub conversation_id : Option< String >,
    /// Target model, used to resolve the provider.
    pub model : String,
    /// System prompt override, if the caller supplied one.
    pub system_prompt : Option< String >,
    /// Raw user message, not yet sanitized.
    pub message : String,
    /// Generation parameters.
    pub parameters : ChatParameters,
    /// Extracted page context, if any.
    pub context : PageContext,
  }

  /// The outcome of a successful one-shot dispatch (spec §4.5 step 9).
  #[ derive( Debug, Clone ) ]
  pub struct DispatchReply
  {
    /// The conversation the exchange was recorded against.
    pub conversation_id : String,
    /// Assistant content.
    pub content : String,
    /// USD cost of this exchange.
    pub cost : f64,
  }

  fn turn_from_message( message : &Message ) -> ChatTurn
  {
    let role = match message.role
    {
      MessageRole::User => "user",
      MessageRole::Assistant => "assistant",
      MessageRole::System => "system",
    };
    ChatTurn { role : role.to_string(), content : message.content.clone() }
  }

  /// Turns a validated request into a single, cost-accounted provider
  /// exchange and persists the result (spec §4.5). Shared by the one-shot
  /// `chat` surface and, for its first seven steps, by the Stream Controller.
  pub struct Dispatcher
  {
    policy_gate : Arc< PolicyGate >,
    credential_vault : Arc< CredentialVault >,
    storage_engine : Arc< StorageEngine >,
    provider_registry : Arc< ProviderRegistry >,
    history_window : usize,
  }

  impl Dispatcher
  {
    /// Wires the four collaborators a dispatch needs.
    #[ must_use ]
    pub fn new(
      policy_gate : Arc< PolicyGate >,
      credential_vault : Arc< CredentialVault >,
      storage_engine : Arc< StorageEngine >,
      provider_registry : Arc< ProviderRegistry >,
      history_window : usize,
    ) -> Self
    {
      Self { policy_gate, credential_vault, storage_engine, provider_registry, history_window }
    }

    /// Steps 1–7 of spec §4.5, shared by the one-shot and streaming paths :
    /// admits the request, resolves the provider and credential, ensures a
    /// conversation, loads prior turns, builds the provider request, and
    /// persists the user's message. Returns everything the caller needs to
    /// either call `providerRegistry.chat` directly or hand off to the
    /// Stream Controller.
    pub async fn prepare( &self, request : &DispatchRequest )
      -> Result< ( String, secrecy::SecretString, ChatRequest ) >
    {
      self.policy_gate.check_rate_limit( &request.client_id )?;
      let sanitized_message = self.policy_gate.sanitize_message( &request.message )?;

      let provider_id = self.provider_registry.provider_id_for( &request.model )
        .ok_or_else( || KernelError::Internal( format!( "no provider accepts model {}", request.model ) ) )?;

      let origin = self.provider_registry.origin_for( provider_id )
        .ok_or_else( || KernelError::Internal( format!( "unknown provider {provider_id}" ) ) )?;
      self.policy_gate.validate_endpoint_origin( origin )?;

      let api_key = self.credential_vault.get( provider_id ).await?
        .ok_or_else( || KernelError::CredentialMissing { provider : provider_id.to_string() } )?;

      if !self.provider_registry.validate_key( provider_id, secrecy::ExposeSecret::expose_secret( &api_key ) )
      {
        return Err( KernelError::CredentialInvalid );
      }

      let conversation_id = match &request.conversation_id
      {
        Some( id ) => id.clone(),
        None =>
        {
          let conversation = self.storage_engine
            .create_conversation( None, ConversationMetadata { url : request.context.url.clone(), ..Default::default() } )
            .await?;
          conversation.id
        }
      };

      let prior_messages = self.storage_engine.list_messages(
        &conversation_id,
        &MessageListQuery { page_size : Some( self.history_window ), role : None, include_system : false },
      ).await?;
      let prior_turns : Vec< ChatTurn > = prior_messages.iter().map( turn_from_message ).collect();

      let user_message = if prior_turns.is_empty() && !request.context.is_empty()
      {
        format!( "{}\n\n{}", request.context.render_block(), sanitized_message )
      }
      else
      {
        sanitized_message.clone()
      };

      self.storage_engine.add_message(
        &conversation_id,
        NewMessage
        {
          role : MessageRole::User,
          content : sanitized_message,
          metadata : MessageMetadata::default(),
          cost : 0.0,
        },
      ).await?;

      let chat_request = ChatRequest
      {
        model : request.model.clone(),
        system_prompt : request.system_prompt.clone(),
        prior_turns,
        user_message,
        parameters : request.parameters.clone(),
      };

      Ok( ( conversation_id, api_key, chat_request ) )
    }

    /// The full one-shot path (spec §4.5 steps 1–10).
    pub async fn chat( &self, request : &DispatchRequest ) -> Result< DispatchReply >
    {
      let ( conversation_id, api_key, chat_request ) = self.prepare( request ).await?;

      let reply = self.provider_registry.chat( &request.model, &api_key, &chat_request ).await;

      let reply : ChatReply = match reply
      {
        Ok( reply ) => reply,
        Err( error ) =>
        {
          tracing::warn!( conversation_id, kind = error.kind(), "dispatch failed after the user message was persisted" );
          return Err( error );
        }
      };

      self.storage_engine.add_message(
        &conversation_id,
        NewMessage
        {
          role : MessageRole::Assistant,
          content : reply.content.clone(),
          metadata : MessageMetadata { model : Some( request.model.clone() ), tokens : Some( reply.usage.total() ) },
          cost : reply.cost,
        },
      ).await?;

      Ok( DispatchReply { conversation_id, content : reply.content, cost : reply.cost } )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::config::KernelConfig;
    use crate::credential_vault::InMemorySecretStore;
    use crate::storage_engine::engine::StorageEngineLimits;
    use crate::storage_engine::store::InMemoryStore;

    async fn dispatcher_with_key( provider : &str, key : &str ) -> Dispatcher
    {
      let config = KernelConfig::default();
      let vault = Arc::new( CredentialVault::new( Arc::new( InMemorySecretStore::default() ), 100 ) );
      vault.initialize().await.unwrap();
      vault.store( provider, key ).await.unwrap();

      Dispatcher::new(
        Arc::new( PolicyGate::new( config.rate_limit_window_ms, config.rate_ledger_max_age_ms, config.max_message_chars ) ),
        vault,
        Arc::new( StorageEngine::new(
          Arc::new( InMemoryStore::default() ),
          StorageEngineLimits
          {
            cache_capacity : config.cache_capacity,
            max_conversations : config.max_conversations,
            eviction_batch_size : config.eviction_batch_size,
            archive_after_days : config.archive_after_days,
            soft_quota_fraction : config.soft_quota_fraction,
            max_title_chars : config.max_title_chars,
            max_stored_message_chars : config.max_stored_message_chars,
          },
        ) ),
        Arc::new( ProviderRegistry::new( &config ) ),
        config.history_window,
      )
    }

    #[ tokio::test ]
    async fn missing_credential_fails_before_any_network_call()
    {
      let config = KernelConfig::default();
      let vault = Arc::new( CredentialVault::new( Arc::new( InMemorySecretStore::default() ), 100 ) );
      vault.initialize().await.unwrap();

      let dispatcher = Dispatcher::new(
        Arc::new( PolicyGate::new( config.rate_limit_window_ms, config.rate_ledger_max_age_ms, config.max_message_chars ) ),
        vault,
        Arc::new( StorageEngine::new(
          Arc::new( InMemoryStore::default() ),
          StorageEngineLimits
          {
            cache_capacity : config.cache_capacity,
            max_conversations : config.max_conversations,
            eviction_batch_size : config.eviction_batch_size,
            archive_after_days : config.archive_after_days,
            soft_quota_fraction : config.soft_quota_fraction,
            max_title_chars : config.max_title_chars,
            max_stored_message_chars : config.max_stored_message_chars,
          },
        ) ),
        Arc::new( ProviderRegistry::new( &config ) ),
        config.history_window,
      );

      let request = DispatchRequest
      {
        client_id : "tab-1".into(),
        conversation_id : None,
        model : "deepseek-chat".into(),
        system_prompt : None,
        message : "hello".into(),
        parameters : ChatParameters::default(),
        context : PageContext::default(),
      };

      let err = dispatcher.chat( &request ).await.unwrap_err();
      assert_eq!( err.kind(), "credential_missing" );
    }

    #[ tokio::test ]
    async fn unknown_model_is_rejected_before_any_credential_lookup()
    {
      let dispatcher = dispatcher_with_key( "deepseek", &format!( "sk-{}", "a".repeat( 48 ) ) ).await;

      let request = DispatchRequest
      {
        client_id : "tab-1".into(),
        conversation_id : None,
        model : "llama-unknown".into(),
        system_prompt : None,
        message : "hello".into(),
        parameters : ChatParameters::default(),
        context : PageContext::default(),
      };

      let err = dispatcher.chat( &request ).await.unwrap_err();
      assert_eq!( err.kind(), "internal" );
    }

    #[ tokio::test ]
    async fn invalid_credential_format_is_rejected()
    {
      let dispatcher = dispatcher_with_key( "deepseek", "not-a-real-key" ).await;

      let request = DispatchRequest
      {
        client_id : "tab-1".into(),
        conversation_id : None,
        model : "deepseek-chat".into(),
        system_prompt : None,
        message : "hello".into(),
        parameters : ChatParameters::default(),
        context : PageContext::default(),
      };

      let err = dispatcher.chat( &request ).await.unwrap_err();
      assert_eq!( err.kind(), "credential_invalid" );
    }

    #[ tokio::test ]
    async fn page_context_is_prepended_only_on_the_first_turn()
    {
      let dispatcher = dispatcher_with_key( "deepseek", &format!( "sk-{}", "a".repeat( 48 ) ) ).await;

      let request = DispatchRequest
      {
        client_id : "tab-1".into(),
        conversation_id : None,
        model : "deepseek-chat".into(),
        system_prompt : None,
        message : "summarize this".into(),
        parameters : ChatParameters::default(),
        context : PageContext
        {
          url : Some( "https://example.com".into() ),
          title : Some( "Example".into() ),
          content : Some( "lorem ipsum".into() ),
          relevance_score : Some( 0.9 ),
        },
      };

      // prepare() alone, to avoid making a real network call in a unit test.
      let ( conversation_id, _key, chat_request ) = dispatcher.prepare( &request ).await.unwrap();
      assert!( chat_request.user_message.contains( "https://example.com" ) );
      assert!( chat_request.user_message.ends_with( "summarize this" ) );
      assert!( !conversation_id.is_empty() );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    PageContext,
    DispatchRequest,
    DispatchReply,
    Dispatcher,
  };
}

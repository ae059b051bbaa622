mod private
{
  use crate::config::KernelConfig;
  use crate::credential_vault::{ CredentialVault, InMemorySecretStore };
  use crate::dispatcher::{ DispatchRequest, Dispatcher };
  use crate::error::{ KernelError, Result };
  use crate::export_import::ExportImportService;
  use crate::interfaces::{ KernelRequest, KernelResponse };
  use crate::policy_gate::PolicyGate;
  use crate::provider_registry::registry::ProviderRegistry;
  use crate::storage_engine::conversation::ConversationPatch;
  use crate::storage_engine::engine::{ StorageEngine, StorageEngineLimits };
  use crate::storage_engine::message::MessageListQuery;
  use crate::storage_engine::store::InMemoryStore;
  use crate::stream_controller::StreamController;
  use std::sync::Arc;

  /// Composes the six components behind one handle. Construction wires every
  /// collaborator from a single [`KernelConfig`]; callers that need a
  /// host-backed `SecretStore` or `Store` should use [`Kernel::with_backing`]
  /// instead of [`Kernel::new`]'s in-memory defaults.
  pub struct Kernel
  {
    /// Admission control : rate limiting, sanitization, endpoint allow-list.
    pub policy_gate : Arc< PolicyGate >,
    /// Confidential at-rest storage of provider API keys.
    pub credential_vault : Arc< CredentialVault >,
    /// Conversation/message persistence, caching, and eviction.
    pub storage_engine : Arc< StorageEngine >,
    /// Uniform access to the three LLM providers.
    pub provider_registry : Arc< ProviderRegistry >,
    /// One-shot `chat` orchestration.
    pub dispatcher : Arc< Dispatcher >,
    /// Long-lived streaming session orchestration.
    pub stream_controller : Arc< StreamController >,
    /// Bulk conversation export/import jobs.
    pub export_import : Arc< ExportImportService >,
  }

  impl Kernel
  {
    /// Builds a kernel with in-memory backing for credentials and storage —
    /// suitable for tests and for hosts that wire in their own persistence
    /// later via [`Kernel::with_backing`].
    pub async fn new( config : KernelConfig ) -> Result< Self >
    {
      Self::with_backing(
        config,
        Arc::new( InMemorySecretStore::default() ),
        Arc::new( InMemoryStore::default() ),
      ).await
    }

    /// Builds a kernel over host-provided credential and storage backends.
    pub async fn with_backing(
      config : KernelConfig,
      secret_store : Arc< dyn crate::credential_vault::SecretStore >,
      store : Arc< dyn crate::storage_engine::store::Store >,
    ) -> Result< Self >
    {
      let policy_gate = Arc::new( PolicyGate::new(
        config.rate_limit_window_ms,
        config.rate_ledger_max_age_ms,
        config.max_message_chars,
      ) );

      let credential_vault = Arc::new( CredentialVault::new( secret_store, config.pbkdf2_iterations ) );
      credential_vault.initialize().await?;

      let storage_engine = Arc::new( StorageEngine::new(
        store,
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
      ) );

      let provider_registry = Arc::new( ProviderRegistry::new( &config ) );

      let dispatcher = Arc::new( Dispatcher::new(
        Arc::clone( &policy_gate ),
        Arc::clone( &credential_vault ),
        Arc::clone( &storage_engine ),
        Arc::clone( &provider_registry ),
        config.history_window,
      ) );

      let stream_controller = Arc::new( StreamController::new(
        Arc::clone( &dispatcher ),
        Arc::clone( &provider_registry ),
        Arc::clone( &storage_engine ),
        config.max_reconnect_attempts,
        config.backoff_cap_ms,
        config.backoff_jitter,
      ) );

      let export_import = Arc::new( ExportImportService::new( Arc::clone( &storage_engine ) ) );

      Ok( Self
      {
        policy_gate,
        credential_vault,
        storage_engine,
        provider_registry,
        dispatcher,
        stream_controller,
        export_import,
      } )
    }

    /// Dispatches one request from the request/reply surface (spec §6.A),
    /// exhaustively matching every `KernelRequest` variant and converting a
    /// failed `Result` into `KernelResponse::Error` rather than letting it
    /// propagate — the port boundary never surfaces a raw `KernelError`.
    pub async fn handle( &self, request : KernelRequest ) -> KernelResponse
    {
      match self.handle_inner( request ).await
      {
        Ok( response ) => response,
        Err( error ) => KernelResponse::Error { kind : error.kind(), message : error.to_string() },
      }
    }

    async fn handle_inner( &self, request : KernelRequest ) -> Result< KernelResponse >
    {
      match request
      {
        KernelRequest::Chat { message, model, conversation_id, context, parameters, client_id } =>
        {
          let reply = self.dispatcher.chat( &DispatchRequest
          {
            client_id,
            conversation_id,
            model,
            system_prompt : None,
            message,
            parameters : parameters.unwrap_or_default(),
            context : context.unwrap_or_default(),
          } ).await?;
          Ok( KernelResponse::Chat { content : reply.content, cost : reply.cost } )
        }

        KernelRequest::TestApiConnection { provider } =>
        {
          let key = self.credential_vault.get( &provider ).await?
            .ok_or_else( || KernelError::CredentialMissing { provider : provider.clone() } )?;
          if !self.provider_registry.validate_key( &provider, secrecy::ExposeSecret::expose_secret( &key ) )
          {
            return Err( KernelError::CredentialInvalid );
          }
          Ok( KernelResponse::ApiConnectionOk )
        }

        KernelRequest::ConversationCreate { title, metadata } =>
        {
          let conversation = self.storage_engine.create_conversation(
            title, metadata.map( patch_to_metadata ).unwrap_or_default(),
          ).await?;
          Ok( KernelResponse::ConversationCreated { conversation } )
        }

        KernelRequest::ConversationList { query } =>
        {
          let ( conversations, total ) = self.storage_engine.list_conversations( &query ).await?;
          Ok( KernelResponse::ConversationList { conversations, total } )
        }

        KernelRequest::ConversationGet { conversation_id } =>
        {
          let conversation = self.storage_engine.get_conversation( &conversation_id ).await?;
          let messages = self.storage_engine.list_messages(
            &conversation_id, &MessageListQuery { page_size : None, role : None, include_system : true },
          ).await?;
          Ok( KernelResponse::ConversationDetail { conversation, messages } )
        }

        KernelRequest::ConversationUpdate { conversation_id, title, archived, metadata } =>
        {
          let conversation = self.storage_engine.update_conversation(
            &conversation_id,
            ConversationPatch { title, archived, metadata },
          ).await?;
          Ok( KernelResponse::ConversationUpdated { conversation } )
        }

        KernelRequest::ConversationDelete { conversation_id } =>
        {
          self.storage_engine.delete_conversation( &conversation_id ).await?;
          Ok( KernelResponse::Success )
        }

        KernelRequest::MessageAdd { conversation_id, message } =>
        {
          let message = self.storage_engine.add_message( &conversation_id, message ).await?;
          Ok( KernelResponse::MessageAdded { message_id : message.id } )
        }

        KernelRequest::MessagesClear { conversation_id } =>
        {
          self.storage_engine.clear_messages( &conversation_id ).await?;
          Ok( KernelResponse::Success )
        }

        KernelRequest::SearchMessages { conversation_id, query, role, include_system } =>
        {
          let results = self.storage_engine.search_messages( &conversation_id, &query, role, include_system ).await?;
          Ok( KernelResponse::SearchResults { results } )
        }

        KernelRequest::ExportConversations { query } =>
        {
          let export_id = self.export_import.export_conversations( &query ).await?;
          Ok( KernelResponse::ExportStarted { export_id } )
        }

        KernelRequest::ImportConversations { bundle } =>
        {
          let import_id = self.export_import.import_conversations( bundle ).await?;
          Ok( KernelResponse::ImportStarted { import_id } )
        }

        KernelRequest::GetExportProgress { export_id } =>
        {
          let status = self.export_import.progress( &export_id )
            .ok_or_else( || KernelError::StorageNotFound( export_id ) )?;
          Ok( KernelResponse::JobProgress { status } )
        }

        KernelRequest::GetImportProgress { import_id } =>
        {
          let status = self.export_import.progress( &import_id )
            .ok_or_else( || KernelError::StorageNotFound( import_id ) )?;
          Ok( KernelResponse::JobProgress { status } )
        }
      }
    }
  }

  fn patch_to_metadata(
    patch : crate::storage_engine::conversation::ConversationMetadataPatch,
  ) -> crate::storage_engine::conversation::ConversationMetadata
  {
    crate::storage_engine::conversation::ConversationMetadata
    {
      url : patch.url,
      domain : patch.domain,
      tags : patch.tags.unwrap_or_default(),
      total_cost : 0.0,
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ tokio::test ]
    async fn kernel_boots_with_default_config()
    {
      let kernel = Kernel::new( KernelConfig::default() ).await.unwrap();
      assert!( kernel.credential_vault.get( "deepseek" ).await.unwrap().is_none() );
    }

    #[ tokio::test ]
    async fn handle_creates_lists_and_gets_a_conversation()
    {
      let kernel = Kernel::new( KernelConfig::default() ).await.unwrap();

      let created = match kernel.handle( KernelRequest::ConversationCreate { title : Some( "trip".into() ), metadata : None } ).await
      {
        KernelResponse::ConversationCreated { conversation } => conversation,
        other => panic!( "unexpected response : {other:?}" ),
      };

      let listed = match kernel.handle( KernelRequest::ConversationList { query : crate::storage_engine::conversation::ConversationListQuery::default() } ).await
      {
        KernelResponse::ConversationList { conversations, total } =>
        {
          assert_eq!( total, 1 );
          conversations
        }
        other => panic!( "unexpected response : {other:?}" ),
      };
      assert_eq!( listed[ 0 ].id, created.id );

      match kernel.handle( KernelRequest::ConversationGet { conversation_id : created.id.clone() } ).await
      {
        KernelResponse::ConversationDetail { conversation, messages } =>
        {
          assert_eq!( conversation.id, created.id );
          assert!( messages.is_empty() );
        }
        other => panic!( "unexpected response : {other:?}" ),
      }
    }

    #[ tokio::test ]
    async fn handle_maps_missing_credential_to_an_error_response()
    {
      let kernel = Kernel::new( KernelConfig::default() ).await.unwrap();

      let response = kernel.handle( KernelRequest::TestApiConnection { provider : "deepseek".into() } ).await;
      match response
      {
        KernelResponse::Error { kind, .. } => assert_eq!( kind, "credential_missing" ),
        other => panic!( "unexpected response : {other:?}" ),
      }
    }

    #[ tokio::test ]
    async fn handle_exports_then_imports_a_conversation_by_polling_job_progress()
    {
      let kernel = Kernel::new( KernelConfig::default() ).await.unwrap();
      kernel.handle( KernelRequest::ConversationCreate { title : Some( "trip".into() ), metadata : None } ).await;

      let export_id = match kernel.handle( KernelRequest::ExportConversations
      {
        query : crate::storage_engine::conversation::ConversationListQuery::default(),
      } ).await
      {
        KernelResponse::ExportStarted { export_id } => export_id,
        other => panic!( "unexpected response : {other:?}" ),
      };

      let bundle = match kernel.handle( KernelRequest::GetExportProgress { export_id } ).await
      {
        KernelResponse::JobProgress { status : crate::export_import::JobStatus::ExportComplete { bundle } } => bundle,
        other => panic!( "unexpected response : {other:?}" ),
      };
      assert_eq!( bundle.conversations.len(), 1 );

      let import_id = match kernel.handle( KernelRequest::ImportConversations { bundle } ).await
      {
        KernelResponse::ImportStarted { import_id } => import_id,
        other => panic!( "unexpected response : {other:?}" ),
      };

      match kernel.handle( KernelRequest::GetImportProgress { import_id } ).await
      {
        KernelResponse::JobProgress { status : crate::export_import::JobStatus::ImportComplete { imported_conversations, .. } } =>
        {
          assert_eq!( imported_conversations, 1 );
        }
        other => panic!( "unexpected response : {other:?}" ),
      }
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    Kernel,
  };
}

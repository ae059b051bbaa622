mod private
{
  use crate::error::Result;
  use crate::storage_engine::conversation::{ Conversation, ConversationListQuery };
  use crate::storage_engine::engine::StorageEngine;
  use crate::storage_engine::message::{ Message, MessageListQuery, NewMessage };
  use std::collections::HashMap;
  use std::sync::{ Arc, Mutex };

  /// One conversation and its full message history, the unit exported and
  /// imported as a whole (spec §6.A).
  #[ derive( Debug, Clone, serde::Serialize, serde::Deserialize ) ]
  pub struct ExportedConversation
  {
    /// The conversation itself.
    pub conversation : Conversation,
    /// Every message in the conversation, in storage order.
    pub messages : Vec< Message >,
  }

  /// The full export payload: every conversation matching the requested
  /// filter, each with its complete message history.
  #[ derive( Debug, Clone, Default, serde::Serialize, serde::Deserialize ) ]
  pub struct ExportBundle
  {
    /// Exported conversations.
    pub conversations : Vec< ExportedConversation >,
  }

  /// Progress/outcome of an export or import job (spec §6.A). Jobs against
  /// the in-memory store complete before `export_conversations`/
  /// `import_conversations` even return, so `InProgress` is never actually
  /// observed by `get_export_progress`/`get_import_progress` today — the
  /// variant still exists because the port contract models both operations
  /// as start-then-poll, and a host-backed `Store` with real I/O would make
  /// it reachable.
  #[ derive( Debug, Clone ) ]
  pub enum JobStatus
  {
    /// Still running; `processed` of `total` conversations handled so far.
    InProgress
    {
      /// Conversations handled so far.
      processed : usize,
      /// Conversations to process in total.
      total : usize,
    },
    /// An export job finished with `bundle` ready to hand back to the caller.
    ExportComplete
    {
      /// The exported data.
      bundle : ExportBundle,
    },
    /// An import job finished having recreated this many conversations and
    /// messages.
    ImportComplete
    {
      /// Conversations recreated.
      imported_conversations : usize,
      /// Messages replayed across all recreated conversations.
      imported_messages : usize,
    },
    /// The job failed; `message` is the human-readable reason.
    Failed
    {
      /// Human-readable reason.
      message : String,
    },
  }

  /// Tracks export/import jobs by id so the request/reply surface can start
  /// a job and poll it separately (spec §6.A). Each conversation is
  /// exported/imported together with its full message history, never just
  /// metadata.
  #[ derive( Debug ) ]
  pub struct ExportImportService
  {
    storage_engine : Arc< StorageEngine >,
    jobs : Mutex< HashMap< String, JobStatus > >,
  }

  impl ExportImportService
  {
    /// Builds a service over `storage_engine`.
    #[ must_use ]
    pub fn new( storage_engine : Arc< StorageEngine > ) -> Self
    {
      Self { storage_engine, jobs : Mutex::new( HashMap::new() ) }
    }

    /// Starts an export of every conversation matching `query`, each with
    /// its full message history, and returns the job id. Completes
    /// synchronously against the in-memory store.
    pub async fn export_conversations( &self, query : &ConversationListQuery ) -> Result< String >
    {
      let job_id = uuid::Uuid::new_v4().to_string();
      let ( conversations, _total ) = self.storage_engine.list_conversations( query ).await?;

      let mut exported = Vec::with_capacity( conversations.len() );
      for conversation in conversations
      {
        let messages = self.storage_engine.list_messages(
          &conversation.id,
          &MessageListQuery { page_size : None, role : None, include_system : true },
        ).await?;
        exported.push( ExportedConversation { conversation, messages } );
      }

      let bundle = ExportBundle { conversations : exported };
      self.jobs.lock().unwrap().insert( job_id.clone(), JobStatus::ExportComplete { bundle } );
      Ok( job_id )
    }

    /// Starts an import of every conversation in `bundle`, each recreated as
    /// a brand-new conversation with its messages replayed in order, and
    /// returns the job id. Completes synchronously against the in-memory
    /// store.
    pub async fn import_conversations( &self, bundle : ExportBundle ) -> Result< String >
    {
      let job_id = uuid::Uuid::new_v4().to_string();
      let mut imported_messages = 0_usize;
      let imported_conversations = bundle.conversations.len();

      for entry in bundle.conversations
      {
        let created = self.storage_engine.create_conversation(
          Some( entry.conversation.title ),
          entry.conversation.metadata,
        ).await?;

        for message in entry.messages
        {
          self.storage_engine.add_message(
            &created.id,
            NewMessage
            {
              role : message.role,
              content : message.content,
              metadata : message.metadata,
              cost : message.cost,
            },
          ).await?;
          imported_messages += 1;
        }
      }

      self.jobs.lock().unwrap().insert(
        job_id.clone(),
        JobStatus::ImportComplete { imported_conversations, imported_messages },
      );
      Ok( job_id )
    }

    /// Polls the status of a previously started export or import job.
    #[ must_use ]
    pub fn progress( &self, job_id : &str ) -> Option< JobStatus >
    {
      self.jobs.lock().unwrap().get( job_id ).cloned()
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::storage_engine::conversation::ConversationMetadata;
    use crate::storage_engine::engine::StorageEngineLimits;
    use crate::storage_engine::message::{ MessageMetadata, MessageRole };
    use crate::storage_engine::store::InMemoryStore;

    fn service() -> ExportImportService
    {
      let storage_engine = Arc::new( StorageEngine::new(
        Arc::new( InMemoryStore::default() ),
        StorageEngineLimits
        {
          cache_capacity : 50,
          max_conversations : 1_000,
          eviction_batch_size : 50,
          archive_after_days : 30,
          soft_quota_fraction : 0.8,
          max_title_chars : 200,
          max_stored_message_chars : 100_000,
        },
      ) );
      ExportImportService::new( storage_engine )
    }

    #[ tokio::test ]
    async fn export_then_import_round_trips_conversation_and_messages()
    {
      let service = service();
      let conversation = service.storage_engine
        .create_conversation( Some( "trip".into() ), ConversationMetadata::default() )
        .await.unwrap();
      service.storage_engine.add_message(
        &conversation.id,
        NewMessage
        {
          role : MessageRole::User,
          content : "hello".into(),
          metadata : MessageMetadata::default(),
          cost : 0.0,
        },
      ).await.unwrap();

      let export_job = service.export_conversations( &ConversationListQuery::default() ).await.unwrap();
      let bundle = match service.progress( &export_job ).unwrap()
      {
        JobStatus::ExportComplete { bundle } => bundle,
        other => panic!( "unexpected status : {other:?}" ),
      };
      assert_eq!( bundle.conversations.len(), 1 );
      assert_eq!( bundle.conversations[ 0 ].messages.len(), 1 );

      let import_job = service.import_conversations( bundle ).await.unwrap();
      match service.progress( &import_job ).unwrap()
      {
        JobStatus::ImportComplete { imported_conversations, imported_messages } =>
        {
          assert_eq!( imported_conversations, 1 );
          assert_eq!( imported_messages, 1 );
        }
        other => panic!( "unexpected status : {other:?}" ),
      }

      let ( all, total ) = service.storage_engine
        .list_conversations( &ConversationListQuery::default() )
        .await.unwrap();
      assert_eq!( total, 2 );
      assert!( all.iter().any( | c | c.title == "trip" ) );
    }

    #[ tokio::test ]
    async fn unknown_job_id_has_no_progress()
    {
      let service = service();
      assert!( service.progress( "missing" ).is_none() );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    ExportedConversation,
    ExportBundle,
    JobStatus,
    ExportImportService,
  };
}

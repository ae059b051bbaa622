mod private
{
  use crate::error::{ KernelError, Result };
  use crate::storage_engine::cache::ConversationCache;
  use crate::storage_engine::conversation::
  {
    Conversation, ConversationListQuery, ConversationPatch, ConversationSortBy, SortOrder,
  };
  use crate::storage_engine::eviction::select_eviction_candidates;
  use crate::storage_engine::message::
  {
    Message, MessageListQuery, MessageRole, MessageSearchHit, NewMessage,
  };
  use crate::storage_engine::store::Store;
  use std::sync::Arc;

  fn now_ms() -> i64
  {
    chrono::Utc::now().timestamp_millis()
  }

  fn new_id() -> String
  {
    uuid::Uuid::new_v4().to_string()
  }

  /// Durable conversation/message persistence with indexed queries, a bounded
  /// LRU cache, and quota-aware eviction (spec §4.4).
  #[ derive( Debug ) ]
  pub struct StorageEngine
  {
    store : Arc< dyn Store >,
    cache : ConversationCache,
    max_conversations : usize,
    eviction_batch_size : usize,
    archive_after_days : i64,
    soft_quota_fraction : f64,
    max_title_chars : usize,
    max_stored_message_chars : usize,
  }

  /// Tunables `StorageEngine::new` needs from `KernelConfig`, kept narrow so
  /// this module doesn't depend on the whole config struct's shape.
  #[ derive( Debug, Clone, Copy ) ]
  pub struct StorageEngineLimits
  {
    /// Conversation LRU cache capacity.
    pub cache_capacity : usize,
    /// Maximum conversations before eviction kicks in on create.
    pub max_conversations : usize,
    /// Eviction batch size.
    pub eviction_batch_size : usize,
    /// Archived-and-older-than-this becomes an eviction candidate.
    pub archive_after_days : i64,
    /// Soft quota fraction above which a create triggers eviction first.
    pub soft_quota_fraction : f64,
    /// Maximum conversation title length.
    pub max_title_chars : usize,
    /// Maximum stored message length, in code points.
    pub max_stored_message_chars : usize,
  }

  impl StorageEngine
  {
    /// Builds a storage engine over `store`.
    #[ must_use ]
    pub fn new( store : Arc< dyn Store >, limits : StorageEngineLimits ) -> Self
    {
      Self
      {
        store,
        cache : ConversationCache::new( limits.cache_capacity ),
        max_conversations : limits.max_conversations,
        eviction_batch_size : limits.eviction_batch_size,
        archive_after_days : limits.archive_after_days,
        soft_quota_fraction : limits.soft_quota_fraction,
        max_title_chars : limits.max_title_chars,
        max_stored_message_chars : limits.max_stored_message_chars,
      }
    }

    async fn evict_if_needed( &self ) -> Result< () >
    {
      let over_quota = self.store.quota_used_fraction().await? >= self.soft_quota_fraction;
      let conversations = self.store.load_conversations().await?;

      if conversations.len() < self.max_conversations && !over_quota
      {
        return Ok( () );
      }

      let victims = select_eviction_candidates(
        &conversations, now_ms(), self.archive_after_days, self.eviction_batch_size,
      );

      if victims.is_empty() && conversations.len() >= self.max_conversations
      {
        tracing::warn!( "no archived conversation available to evict; creation proceeds over soft limit" );
        return Ok( () );
      }

      for id in &victims
      {
        self.delete_conversation( id ).await?;
      }
      tracing::info!( evicted = victims.len(), "evicted archived conversations" );
      Ok( () )
    }

    /// Creates a conversation, triggering eviction first if the store is at
    /// capacity or over the soft quota threshold.
    pub async fn create_conversation(
      &self,
      title : Option< String >,
      metadata : crate::storage_engine::conversation::ConversationMetadata,
    ) -> Result< Conversation >
    {
      self.evict_if_needed().await?;

      let mut title = title.unwrap_or_else( || "New conversation".to_string() );
      if title.chars().count() > self.max_title_chars
      {
        title = title.chars().take( self.max_title_chars ).collect();
      }

      let mut conversation = Conversation::new( new_id(), title, now_ms() );
      conversation.metadata = metadata;
      self.store.save_conversation( &conversation ).await?;
      self.cache.put( conversation.clone() );
      Ok( conversation )
    }

    /// Returns the conversation for `id`, serving from cache and updating
    /// `state.last_accessed_at` on every call.
    pub async fn get_conversation( &self, id : &str ) -> Result< Conversation >
    {
      let mut conversation = if let Some( cached ) = self.cache.get( id )
      {
        cached
      }
      else
      {
        self.store.load_conversations().await?
          .into_iter()
          .find( | c | c.id == id )
          .ok_or_else( || KernelError::StorageNotFound( id.to_string() ) )?
      };

      conversation.state.last_accessed_at = now_ms();
      self.store.save_conversation( &conversation ).await?;
      self.cache.put( conversation.clone() );
      Ok( conversation )
    }

    /// Lists conversations matching `query`, sorted and paginated as
    /// requested, returning `(page, total_matching)`.
    pub async fn list_conversations(
      &self,
      query : &ConversationListQuery,
    ) -> Result< ( Vec< Conversation >, usize ) >
    {
      let mut all = self.store.load_conversations().await?;

      if let Some( archived ) = query.archived
      {
        all.retain( | c | c.archived == archived );
      }

      if let Some( needle ) = query.search.as_deref().filter( | s | !s.is_empty() )
      {
        let needle_lower = needle.to_lowercase();
        all.retain( | c |
        {
          c.title.to_lowercase().contains( &needle_lower )
            || c.metadata.url.as_deref().is_some_and( | u | u.to_lowercase().contains( &needle_lower ) )
            || c.metadata.tags.iter().any( | t | t.to_lowercase().contains( &needle_lower ) )
        } );
      }

      match query.sort_by
      {
        ConversationSortBy::UpdatedAt => all.sort_by_key( | c | c.updated_at ),
        ConversationSortBy::Title => all.sort_by( | a, b | a.title.cmp( &b.title ) ),
        ConversationSortBy::Url => all.sort_by(
          | a, b | a.metadata.url.cmp( &b.metadata.url )
        ),
      }
      if query.sort_order == SortOrder::Descending
      {
        all.reverse();
      }

      let total = all.len();
      let start = query.page.saturating_sub( 1 ) * query.page_size;
      let page = all.into_iter().skip( start ).take( query.page_size ).collect();
      Ok( ( page, total ) )
    }

    /// Deep-merges `patch` into the stored conversation and bumps `updated_at`.
    pub async fn update_conversation( &self, id : &str, patch : ConversationPatch ) -> Result< Conversation >
    {
      let mut conversation = self.get_conversation( id ).await?;

      if let Some( title ) = patch.title
      {
        conversation.title = title.chars().take( self.max_title_chars ).collect();
      }
      if let Some( archived ) = patch.archived
      {
        conversation.archived = archived;
      }
      if let Some( metadata_patch ) = patch.metadata
      {
        if let Some( url ) = metadata_patch.url { conversation.metadata.url = Some( url ); }
        if let Some( domain ) = metadata_patch.domain { conversation.metadata.domain = Some( domain ); }
        if let Some( tags ) = metadata_patch.tags { conversation.metadata.tags = tags; }
      }
      conversation.updated_at = now_ms();

      self.store.save_conversation( &conversation ).await?;
      self.cache.put( conversation.clone() );
      Ok( conversation )
    }

    /// Sets the `archived` flag without touching anything else.
    pub async fn archive_conversation( &self, id : &str, archived : bool ) -> Result< Conversation >
    {
      let mut conversation = self.get_conversation( id ).await?;
      conversation.archived = archived;
      self.store.save_conversation( &conversation ).await?;
      self.cache.put( conversation.clone() );
      Ok( conversation )
    }

    /// Deletes a conversation and cascades to its messages, then purges the
    /// cache entry.
    pub async fn delete_conversation( &self, id : &str ) -> Result< () >
    {
      self.store.delete_messages_for_conversation( id ).await?;
      self.store.delete_conversation( id ).await?;
      self.cache.invalidate( id );
      Ok( () )
    }

    /// Appends a message to `conversation_id`, validating role/length/parentage
    /// and updating the parent's `messageCount`/`lastMessage`/`updatedAt`.
    pub async fn add_message( &self, conversation_id : &str, data : NewMessage ) -> Result< Message >
    {
      if data.content.chars().count() > self.max_stored_message_chars
      {
        return Err( KernelError::InvalidInput(
          format!( "message exceeds {} characters", self.max_stored_message_chars )
        ) );
      }

      let mut conversation = self.get_conversation( conversation_id ).await?;

      let message = Message
      {
        id : new_id(),
        conversation_id : conversation_id.to_string(),
        role : data.role,
        content : data.content,
        timestamp : now_ms(),
        metadata : data.metadata,
        state : crate::storage_engine::message::MessageState::default(),
        cost : data.cost,
      };

      self.store.save_message( &message ).await?;

      conversation.message_count += 1;
      conversation.last_message = Some( preview( &message.content ) );
      conversation.updated_at = message.timestamp;
      conversation.metadata.total_cost += message.cost;
      self.store.save_conversation( &conversation ).await?;
      self.cache.put( conversation );

      Ok( message )
    }

    /// Lists messages for `conversation_id`, most recent last, applying the
    /// role filter if any.
    pub async fn list_messages(
      &self,
      conversation_id : &str,
      query : &MessageListQuery,
    ) -> Result< Vec< Message > >
    {
      let mut messages = self.store.load_messages( conversation_id ).await?;

      if let Some( role ) = query.role
      {
        messages.retain( | m | m.role == role );
      }
      else if !query.include_system
      {
        messages.retain( | m | m.role != MessageRole::System );
      }

      if let Some( page_size ) = query.page_size
      {
        let len = messages.len();
        messages = messages.into_iter().skip( len.saturating_sub( page_size ) ).collect();
      }

      Ok( messages )
    }

    /// Deletes every message in `conversation_id` and resets the parent's
    /// denormalized counters.
    pub async fn clear_messages( &self, conversation_id : &str ) -> Result< () >
    {
      let mut conversation = self.get_conversation( conversation_id ).await?;
      self.store.delete_messages_for_conversation( conversation_id ).await?;
      conversation.message_count = 0;
      conversation.last_message = None;
      conversation.metadata.total_cost = 0.0;
      conversation.updated_at = now_ms();
      self.store.save_conversation( &conversation ).await?;
      self.cache.put( conversation );
      Ok( () )
    }

    /// Case-insensitive linear substring search over a conversation's
    /// messages, returning a context window around the first match.
    pub async fn search_messages(
      &self,
      conversation_id : &str,
      query : &str,
      role : Option< MessageRole >,
      include_system : bool,
    ) -> Result< Vec< MessageSearchHit > >
    {
      let messages = self.list_messages(
        conversation_id,
        &MessageListQuery { page_size : None, role, include_system },
      ).await?;

      let needle = query.to_lowercase();
      let mut hits = Vec::new();
      for message in messages
      {
        let haystack = message.content.to_lowercase();
        if let Some( pos ) = haystack.find( &needle )
        {
          let start = haystack[ ..pos ].char_indices().rev().nth( 20 ).map_or( 0, | ( i, _ ) | i );
          let end_byte = pos + needle.len();
          let end = haystack[ end_byte.. ].char_indices().nth( 20 )
            .map_or( message.content.len(), | ( i, _ ) | end_byte + i );
          let match_context = message.content[ start..end ].to_string();
          hits.push( MessageSearchHit { message, match_context } );
        }
      }
      Ok( hits )
    }
  }

  fn preview( content : &str ) -> String
  {
    const PREVIEW_CHARS : usize = 80;
    if content.chars().count() <= PREVIEW_CHARS
    {
      content.to_string()
    }
    else
    {
      let mut preview : String = content.chars().take( PREVIEW_CHARS ).collect();
      preview.push( '…' );
      preview
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::storage_engine::conversation::ConversationMetadata;
    use crate::storage_engine::store::InMemoryStore;

    fn engine() -> StorageEngine
    {
      StorageEngine::new(
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
      )
    }

    #[ tokio::test ]
    async fn create_then_get_round_trips()
    {
      let engine = engine();
      let created = engine.create_conversation( Some( "hi".into() ), ConversationMetadata::default() ).await.unwrap();
      let fetched = engine.get_conversation( &created.id ).await.unwrap();
      assert_eq!( created.id, fetched.id );
    }

    #[ tokio::test ]
    async fn get_missing_conversation_is_not_found()
    {
      let engine = engine();
      let err = engine.get_conversation( "missing" ).await.unwrap_err();
      assert_eq!( err.kind(), "storage_not_found" );
    }

    #[ tokio::test ]
    async fn add_message_updates_parent_counters()
    {
      let engine = engine();
      let conversation = engine.create_conversation( None, ConversationMetadata::default() ).await.unwrap();

      engine.add_message(
        &conversation.id,
        NewMessage
        {
          role : MessageRole::User,
          content : "hello".into(),
          metadata : crate::storage_engine::message::MessageMetadata::default(),
          cost : 0.0,
        },
      ).await.unwrap();

      engine.add_message(
        &conversation.id,
        NewMessage
        {
          role : MessageRole::Assistant,
          content : "hi there".into(),
          metadata : crate::storage_engine::message::MessageMetadata::default(),
          cost : 0.0001,
        },
      ).await.unwrap();

      let fetched = engine.get_conversation( &conversation.id ).await.unwrap();
      assert_eq!( fetched.message_count, 2 );
      assert_eq!( fetched.last_message.as_deref(), Some( "hi there" ) );
      assert!( ( fetched.metadata.total_cost - 0.0001 ).abs() < f64::EPSILON );
    }

    #[ tokio::test ]
    async fn delete_conversation_cascades_to_messages()
    {
      let engine = engine();
      let conversation = engine.create_conversation( None, ConversationMetadata::default() ).await.unwrap();
      for _ in 0..3
      {
        engine.add_message(
          &conversation.id,
          NewMessage
          {
            role : MessageRole::User,
            content : "hi".into(),
            metadata : crate::storage_engine::message::MessageMetadata::default(),
            cost : 0.0,
          },
        ).await.unwrap();
      }

      engine.delete_conversation( &conversation.id ).await.unwrap();

      assert!( engine.get_conversation( &conversation.id ).await.is_err() );
      let remaining = engine.list_messages(
        &conversation.id,
        &MessageListQuery::default(),
      ).await.unwrap();
      assert!( remaining.is_empty() );
    }

    #[ tokio::test ]
    async fn search_returns_match_context()
    {
      let engine = engine();
      let conversation = engine.create_conversation( None, ConversationMetadata::default() ).await.unwrap();
      engine.add_message(
        &conversation.id,
        NewMessage
        {
          role : MessageRole::User,
          content : "the quick brown fox jumps over the lazy dog".into(),
          metadata : crate::storage_engine::message::MessageMetadata::default(),
          cost : 0.0,
        },
      ).await.unwrap();

      let hits = engine.search_messages( &conversation.id, "fox", None, true ).await.unwrap();
      assert_eq!( hits.len(), 1 );
      assert!( hits[ 0 ].match_context.contains( "fox" ) );
    }

    #[ tokio::test ]
    async fn eviction_never_removes_an_unarchived_conversation()
    {
      let engine = StorageEngine::new(
        Arc::new( InMemoryStore::default() ),
        StorageEngineLimits
        {
          cache_capacity : 50,
          max_conversations : 2,
          eviction_batch_size : 50,
          archive_after_days : 30,
          soft_quota_fraction : 0.8,
          max_title_chars : 200,
          max_stored_message_chars : 100_000,
        },
      );

      let a = engine.create_conversation( Some( "a".into() ), ConversationMetadata::default() ).await.unwrap();
      let _b = engine.create_conversation( Some( "b".into() ), ConversationMetadata::default() ).await.unwrap();
      // At max_conversations == 2 now; neither is archived, so creating a
      // third must not silently delete either.
      let _c = engine.create_conversation( Some( "c".into() ), ConversationMetadata::default() ).await.unwrap();

      assert!( engine.get_conversation( &a.id ).await.is_ok() );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    StorageEngine,
    StorageEngineLimits,
  };
}

mod private
{
  use crate::error::Result;
  use crate::storage_engine::conversation::Conversation;
  use crate::storage_engine::message::Message;
  use async_trait::async_trait;
  use std::collections::HashMap;
  use std::sync::Mutex;

  /// Durable persistence boundary for conversations and messages. The kernel
  /// ships an in-memory implementation; a host can swap in an IndexedDB- or
  /// SQLite-backed one without touching `StorageEngine`.
  ///
  /// Each method is expected to be internally atomic — the in-memory impl
  /// satisfies this trivially (a `Mutex`-guarded map mutation with no
  /// intervening `.await`), which combined with the kernel's single-threaded
  /// cooperative scheduling (spec §5) is what stands in for the spec's
  /// "single transaction across all affected stores and indexes."
  #[ async_trait ]
  pub trait Store : Send + Sync + core::fmt::Debug
  {
    /// Loads every stored conversation.
    async fn load_conversations( &self ) -> Result< Vec< Conversation > >;
    /// Inserts or overwrites a conversation record.
    async fn save_conversation( &self, conversation : &Conversation ) -> Result< () >;
    /// Deletes a conversation record, if present.
    async fn delete_conversation( &self, id : &str ) -> Result< () >;

    /// Loads every message belonging to `conversation_id`, in insertion order.
    async fn load_messages( &self, conversation_id : &str ) -> Result< Vec< Message > >;
    /// Inserts or overwrites a message record.
    async fn save_message( &self, message : &Message ) -> Result< () >;
    /// Deletes a single message record, if present.
    async fn delete_message( &self, id : &str ) -> Result< () >;
    /// Deletes every message belonging to `conversation_id` (cascade delete).
    async fn delete_messages_for_conversation( &self, conversation_id : &str ) -> Result< () >;

    /// Fraction of available persistent storage currently in use, in `[0, 1]`.
    /// Used to decide whether a write should trigger the eviction path
    /// (spec §5 soft quota).
    async fn quota_used_fraction( &self ) -> Result< f64 >;
  }

  /// Process-lifetime in-memory `Store`. The default backing for the kernel
  /// and the one the test suite exercises directly.
  #[ derive( Debug, Default ) ]
  pub struct InMemoryStore
  {
    conversations : Mutex< HashMap< String, Conversation > >,
    messages : Mutex< HashMap< String, Message > >,
    /// Test/embedder hook : overrides `quota_used_fraction` when set, so the
    /// eviction path can be exercised without actually filling storage.
    forced_quota_fraction : Mutex< Option< f64 > >,
  }

  impl InMemoryStore
  {
    /// Forces `quota_used_fraction` to report `fraction` on subsequent calls.
    pub fn force_quota_fraction( &self, fraction : f64 )
    {
      *self.forced_quota_fraction.lock().unwrap() = Some( fraction );
    }
  }

  #[ async_trait ]
  impl Store for InMemoryStore
  {
    async fn load_conversations( &self ) -> Result< Vec< Conversation > >
    {
      Ok( self.conversations.lock().unwrap().values().cloned().collect() )
    }

    async fn save_conversation( &self, conversation : &Conversation ) -> Result< () >
    {
      self.conversations.lock().unwrap().insert( conversation.id.clone(), conversation.clone() );
      Ok( () )
    }

    async fn delete_conversation( &self, id : &str ) -> Result< () >
    {
      self.conversations.lock().unwrap().remove( id );
      Ok( () )
    }

    async fn load_messages( &self, conversation_id : &str ) -> Result< Vec< Message > >
    {
      let mut out : Vec< Message > = self.messages.lock().unwrap().values()
        .filter( | m | m.conversation_id == conversation_id )
        .cloned()
        .collect();
      out.sort_by_key( | m | m.timestamp );
      Ok( out )
    }

    async fn save_message( &self, message : &Message ) -> Result< () >
    {
      self.messages.lock().unwrap().insert( message.id.clone(), message.clone() );
      Ok( () )
    }

    async fn delete_message( &self, id : &str ) -> Result< () >
    {
      self.messages.lock().unwrap().remove( id );
      Ok( () )
    }

    async fn delete_messages_for_conversation( &self, conversation_id : &str ) -> Result< () >
    {
      self.messages.lock().unwrap().retain( | _, m | m.conversation_id != conversation_id );
      Ok( () )
    }

    async fn quota_used_fraction( &self ) -> Result< f64 >
    {
      if let Some( forced ) = *self.forced_quota_fraction.lock().unwrap()
      {
        return Ok( forced );
      }
      // A real host reports actual disk usage; an in-memory store has no
      // meaningful notion of it, so it always reports comfortably under quota.
      Ok( 0.0 )
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    Store,
    InMemoryStore,
  };
}

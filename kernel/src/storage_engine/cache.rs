mod private
{
  use crate::storage_engine::conversation::Conversation;
  use lru::LruCache;
  use std::num::NonZeroUsize;
  use std::sync::Mutex;

  /// Bounded, invalidate-on-write LRU cache over `Conversation`s, keyed by id
  /// (spec §4.4: capacity 50, invalidated whenever the record is written or
  /// deleted). Modeled on the bounded-cache shape of `api_claude::request_caching`,
  /// generalized here from request caching to entity caching.
  #[ derive( Debug ) ]
  pub struct ConversationCache
  {
    inner : Mutex< LruCache< String, Conversation > >,
  }

  impl ConversationCache
  {
    /// Builds a cache with the given capacity (at least 1).
    #[ must_use ]
    pub fn new( capacity : usize ) -> Self
    {
      let capacity = NonZeroUsize::new( capacity.max( 1 ) ).unwrap();
      Self { inner : Mutex::new( LruCache::new( capacity ) ) }
    }

    /// Returns a clone of the cached conversation, if present, promoting it
    /// to most-recently-used.
    pub fn get( &self, id : &str ) -> Option< Conversation >
    {
      self.inner.lock().unwrap().get( id ).cloned()
    }

    /// Inserts or refreshes the cached entry for `conversation.id`.
    pub fn put( &self, conversation : Conversation )
    {
      self.inner.lock().unwrap().put( conversation.id.clone(), conversation );
    }

    /// Invalidates the cached entry for `id`, if any.
    pub fn invalidate( &self, id : &str )
    {
      self.inner.lock().unwrap().pop( id );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    ConversationCache,
  };
}

mod private
{
  use crate::storage_engine::conversation::Conversation;

  /// Picks which conversations to evict when `count(conversations) >= max_conversations`
  /// (spec §4.4.1). Only archived conversations older than `archive_after_days`
  /// are candidates, taken oldest-`updated_at`-first, in batches of at most
  /// `batch_size`. If no archived-and-stale conversation exists, falls back to
  /// the single oldest archived conversation — an unarchived conversation is
  /// never implicitly evicted.
  #[ must_use ]
  pub fn select_eviction_candidates(
    conversations : &[ Conversation ],
    now_ms : i64,
    archive_after_days : i64,
    batch_size : usize,
  ) -> Vec< String >
  {
    let stale_cutoff_ms = now_ms - archive_after_days * 24 * 60 * 60 * 1_000;

    let mut archived : Vec< &Conversation > = conversations.iter()
      .filter( | c | c.archived )
      .collect();
    archived.sort_by_key( | c | c.updated_at );

    let mut stale : Vec< String > = archived.iter()
      .filter( | c | c.updated_at < stale_cutoff_ms )
      .take( batch_size )
      .map( | c | c.id.clone() )
      .collect();

    if stale.is_empty()
    {
      if let Some( oldest ) = archived.first()
      {
        stale.push( oldest.id.clone() );
      }
    }

    stale
  }
}

crate::mod_interface!
{
  exposed use
  {
    select_eviction_candidates,
  };
}

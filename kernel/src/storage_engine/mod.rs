//! Durable conversation/message persistence with indexed queries, a bounded
//! LRU cache, and quota-aware eviction (spec §4.4).

mod private {}

crate::mod_interface!
{
  layer conversation;
  layer message;
  layer cache;
  layer eviction;
  layer store;
  layer engine;
}

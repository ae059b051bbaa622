mod private
{
  use serde::{ Deserialize, Serialize };

  /// Free-form metadata carried alongside a conversation (spec §3).
  #[ derive( Debug, Clone, Default, Serialize, Deserialize ) ]
  pub struct ConversationMetadata
  {
    /// Page URL the conversation was started from, if any.
    #[ serde( default ) ]
    pub url : Option< String >,
    /// Domain extracted from `url`, if any.
    #[ serde( default ) ]
    pub domain : Option< String >,
    /// User- or UI-assigned tags.
    #[ serde( default ) ]
    pub tags : Vec< String >,
    /// Running sum of `Message::cost` for this conversation, in USD.
    #[ serde( default ) ]
    pub total_cost : f64,
  }

  /// Cache/session-local state for a conversation (spec §3).
  #[ derive( Debug, Clone, Default, Serialize, Deserialize ) ]
  pub struct ConversationState
  {
    /// Whether a stream session is currently open against this conversation.
    #[ serde( default ) ]
    pub is_active : bool,
    /// Timestamp of the last `get`, in milliseconds since the Unix epoch.
    #[ serde( default ) ]
    pub last_accessed_at : i64,
  }

  /// A conversation: the parent entity for a sequence of messages (spec §3).
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  pub struct Conversation
  {
    /// Opaque identifier.
    pub id : String,
    /// User- or auto-generated title, capped at 200 characters.
    pub title : String,
    /// Creation timestamp, milliseconds since the Unix epoch.
    pub created_at : i64,
    /// Last-mutated timestamp; kept equal to the max message timestamp.
    pub updated_at : i64,
    /// Denormalized count, kept equal to `count(messages where conversationId == id)`.
    pub message_count : u64,
    /// Short preview of the most recent message, for list views.
    pub last_message : Option< String >,
    /// Whether this conversation has been archived by the user.
    pub archived : bool,
    /// Free-form metadata.
    pub metadata : ConversationMetadata,
    /// Cache/session-local state.
    pub state : ConversationState,
  }

  impl Conversation
  {
    /// Builds a fresh conversation with the given id/title/timestamp; all
    /// denormalized fields start at their zero values.
    #[ must_use ]
    pub fn new( id : String, title : String, now_ms : i64 ) -> Self
    {
      Self
      {
        id,
        title,
        created_at : now_ms,
        updated_at : now_ms,
        message_count : 0,
        last_message : None,
        archived : false,
        metadata : ConversationMetadata::default(),
        state : ConversationState { is_active : false, last_accessed_at : now_ms },
      }
    }
  }

  /// Sort key for `StorageEngine::list_conversations`.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum ConversationSortBy
  {
    /// Sort by `updated_at`.
    UpdatedAt,
    /// Sort by `title`.
    Title,
    /// Sort by `metadata.url`.
    Url,
  }

  /// Sort direction.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum SortOrder
  {
    /// Smallest/earliest first.
    Ascending,
    /// Largest/latest first.
    Descending,
  }

  /// Query parameters for `StorageEngine::list_conversations` (spec §4.4).
  #[ derive( Debug, Clone ) ]
  pub struct ConversationListQuery
  {
    /// 1-indexed page number.
    pub page : usize,
    /// Page size.
    pub page_size : usize,
    /// Sort key.
    pub sort_by : ConversationSortBy,
    /// Sort direction.
    pub sort_order : SortOrder,
    /// Filter by archived state, if set.
    pub archived : Option< bool >,
    /// Case-insensitive substring search over title/url/tags, if set.
    pub search : Option< String >,
  }

  impl Default for ConversationListQuery
  {
    fn default() -> Self
    {
      Self
      {
        page : 1,
        page_size : 20,
        sort_by : ConversationSortBy::UpdatedAt,
        sort_order : SortOrder::Descending,
        archived : None,
        search : None,
      }
    }
  }

  /// Patch applied by `StorageEngine::update_conversation`. `None` fields are
  /// left untouched; `metadata`/`state` are deep-merged, not replaced.
  #[ derive( Debug, Clone, Default ) ]
  pub struct ConversationPatch
  {
    /// New title, if set.
    pub title : Option< String >,
    /// New archived flag, if set.
    pub archived : Option< bool >,
    /// Metadata fields to merge in.
    pub metadata : Option< ConversationMetadataPatch >,
  }

  /// Field-level patch for `ConversationMetadata`; only set fields are merged.
  #[ derive( Debug, Clone, Default ) ]
  pub struct ConversationMetadataPatch
  {
    /// New url, if set.
    pub url : Option< String >,
    /// New domain, if set.
    pub domain : Option< String >,
    /// New tags, if set (replaces the whole vec).
    pub tags : Option< Vec< String > >,
  }
}

crate::mod_interface!
{
  exposed use
  {
    Conversation,
    ConversationMetadata,
    ConversationState,
    ConversationSortBy,
    SortOrder,
    ConversationListQuery,
    ConversationPatch,
    ConversationMetadataPatch,
  };
}

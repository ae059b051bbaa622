mod private
{
  use serde::{ Deserialize, Serialize };

  /// Author of a `Message` (spec §3).
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
  #[ serde( rename_all = "lowercase" ) ]
  pub enum MessageRole
  {
    /// Sent by the end user.
    User,
    /// Sent by the model.
    Assistant,
    /// A system prompt turn.
    System,
  }

  /// Per-message metadata (spec §3).
  #[ derive( Debug, Clone, Default, Serialize, Deserialize ) ]
  pub struct MessageMetadata
  {
    /// Model that produced this message, for assistant turns.
    #[ serde( default ) ]
    pub model : Option< String >,
    /// Token usage charged to this message, if known.
    #[ serde( default ) ]
    pub tokens : Option< u64 >,
  }

  /// UI-mutable state on a message (spec §3).
  #[ derive( Debug, Clone, Default, Serialize, Deserialize ) ]
  pub struct MessageState
  {
    /// Whether the UI has marked this message as read.
    #[ serde( default ) ]
    pub read : bool,
    /// Whether the user pinned this message.
    #[ serde( default ) ]
    pub pinned : bool,
    /// Whether the user edited this message after creation.
    #[ serde( default ) ]
    pub edited : bool,
  }

  /// A single turn in a conversation (spec §3).
  #[ derive( Debug, Clone, Serialize, Deserialize ) ]
  pub struct Message
  {
    /// Opaque identifier.
    pub id : String,
    /// Owning conversation's id.
    pub conversation_id : String,
    /// Author.
    pub role : MessageRole,
    /// Turn content.
    pub content : String,
    /// Creation timestamp, milliseconds since the Unix epoch.
    pub timestamp : i64,
    /// Per-message metadata.
    pub metadata : MessageMetadata,
    /// UI-mutable state.
    pub state : MessageState,
    /// USD cost attributed to this message (0 for user turns).
    pub cost : f64,
  }

  /// Input to `StorageEngine::add_message`.
  #[ derive( Debug, Clone ) ]
  pub struct NewMessage
  {
    /// Author.
    pub role : MessageRole,
    /// Turn content.
    pub content : String,
    /// Per-message metadata.
    pub metadata : MessageMetadata,
    /// USD cost attributed to this message.
    pub cost : f64,
  }

  /// Query parameters for `StorageEngine::list_messages`.
  #[ derive( Debug, Clone, Default ) ]
  pub struct MessageListQuery
  {
    /// Maximum number of messages to return, most recent first.
    pub page_size : Option< usize >,
    /// Restrict to one role, if set.
    pub role : Option< MessageRole >,
    /// Whether system turns are included when `role` is unset.
    pub include_system : bool,
  }

  /// A single hit from `StorageEngine::search_messages`.
  #[ derive( Debug, Clone ) ]
  pub struct MessageSearchHit
  {
    /// The matching message.
    pub message : Message,
    /// A window of text around the first match, for display.
    pub match_context : String,
  }
}

crate::mod_interface!
{
  exposed use
  {
    MessageRole,
    MessageMetadata,
    MessageState,
    Message,
    NewMessage,
    MessageListQuery,
    MessageSearchHit,
  };
}

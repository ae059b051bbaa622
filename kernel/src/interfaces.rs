mod private
{
  use crate::dispatcher::PageContext;
  use crate::export_import::{ ExportBundle, JobStatus };
  use crate::provider_registry::types::ChatParameters;
  use crate::storage_engine::conversation::
  {
    Conversation, ConversationListQuery, ConversationMetadataPatch,
  };
  use crate::storage_engine::message::{ Message, MessageRole, MessageSearchHit, NewMessage };

  /// One request on the request/reply surface (spec §6.A). A closed,
  /// tagged-variant enum in place of an ad-hoc `{type, ...}` union, so every
  /// request kind is exhaustively matched at compile time (§9 redesign flag).
  #[ derive( Debug, Clone ) ]
  pub enum KernelRequest
  {
    /// `chat_request`.
    Chat
    {
      /// Raw user message.
      message : String,
      /// Target model.
      model : String,
      /// Target conversation; `None` synthesizes a new one.
      conversation_id : Option< String >,
      /// Extracted page context, if any.
      context : Option< PageContext >,
      /// Generation parameters.
      parameters : Option< ChatParameters >,
      /// Sender tab/client id, for rate limiting.
      client_id : String,
    },
    /// `test_api_connection`.
    TestApiConnection
    {
      /// Provider to validate a stored credential for.
      provider : String,
    },
    /// `conversation_create`.
    ConversationCreate
    {
      /// Initial title, if supplied.
      title : Option< String >,
      /// Initial metadata patch, if supplied.
      metadata : Option< ConversationMetadataPatch >,
    },
    /// `conversation_list`.
    ConversationList
    {
      /// Listing parameters.
      query : ConversationListQuery,
    },
    /// `conversation_get`.
    ConversationGet
    {
      /// Target conversation.
      conversation_id : String,
    },
    /// `conversation_update`.
    ConversationUpdate
    {
      /// Target conversation.
      conversation_id : String,
      /// New title, if set.
      title : Option< String >,
      /// New archived flag, if set.
      archived : Option< bool >,
      /// Metadata fields to merge in.
      metadata : Option< ConversationMetadataPatch >,
    },
    /// `conversation_delete`.
    ConversationDelete
    {
      /// Target conversation.
      conversation_id : String,
    },
    /// `message_add`.
    MessageAdd
    {
      /// Target conversation.
      conversation_id : String,
      /// Message to append.
      message : NewMessage,
    },
    /// `messages_clear`.
    MessagesClear
    {
      /// Target conversation.
      conversation_id : String,
    },
    /// `search_messages`.
    SearchMessages
    {
      /// Target conversation.
      conversation_id : String,
      /// Search text.
      query : String,
      /// Restrict to one role, if set.
      role : Option< MessageRole >,
      /// Whether system turns are included when `role` is unset.
      include_system : bool,
    },
    /// `export_conversations`.
    ExportConversations
    {
      /// Which conversations to include.
      query : ConversationListQuery,
    },
    /// `import_conversations`.
    ImportConversations
    {
      /// The previously exported data to recreate.
      bundle : ExportBundle,
    },
    /// `get_export_progress`.
    GetExportProgress
    {
      /// The job id returned by `ExportConversations`.
      export_id : String,
    },
    /// `get_import_progress`.
    GetImportProgress
    {
      /// The job id returned by `ImportConversations`.
      import_id : String,
    },
  }

  /// One response on the request/reply surface (spec §6.A), paired 1:1 with
  /// the `KernelRequest` variant that produced it.
  #[ derive( Debug, Clone ) ]
  pub enum KernelResponse
  {
    /// Reply to `Chat`.
    Chat
    {
      /// Assistant content.
      content : String,
      /// USD cost of the exchange.
      cost : f64,
    },
    /// Reply to `TestApiConnection`.
    ApiConnectionOk,
    /// Reply to `ConversationCreate`.
    ConversationCreated
    {
      /// The new conversation.
      conversation : Conversation,
    },
    /// Reply to `ConversationList`.
    ConversationList
    {
      /// Matching conversations for the requested page.
      conversations : Vec< Conversation >,
      /// Total matching conversations across all pages.
      total : usize,
    },
    /// Reply to `ConversationGet`.
    ConversationDetail
    {
      /// The conversation.
      conversation : Conversation,
      /// Its messages.
      messages : Vec< Message >,
    },
    /// Reply to `ConversationUpdate`.
    ConversationUpdated
    {
      /// The patched conversation.
      conversation : Conversation,
    },
    /// Reply to a request whose only outcome is success/failure.
    Success,
    /// Reply to `MessageAdd`.
    MessageAdded
    {
      /// The new message's id.
      message_id : String,
    },
    /// Reply to `SearchMessages`.
    SearchResults
    {
      /// Matching messages with surrounding context.
      results : Vec< MessageSearchHit >,
    },
    /// Reply to `ExportConversations`.
    ExportStarted
    {
      /// The job id to poll via `GetExportProgress`.
      export_id : String,
    },
    /// Reply to `ImportConversations`.
    ImportStarted
    {
      /// The job id to poll via `GetImportProgress`.
      import_id : String,
    },
    /// Reply to `GetExportProgress`/`GetImportProgress`.
    JobProgress
    {
      /// The job's current status.
      status : JobStatus,
    },
    /// Any request kind's failure path (spec §7).
    Error
    {
      /// Machine-readable error kind.
      kind : &'static str,
      /// Human-readable message.
      message : String,
    },
  }

  /// One message from the client on the streaming port surface (spec §6.B).
  #[ derive( Debug, Clone ) ]
  pub enum PortInbound
  {
    /// `start_stream`.
    StartStream
    {
      /// Raw user message.
      message : String,
      /// Target model.
      model : String,
      /// Target conversation.
      conversation_id : String,
      /// Extracted page context, if any.
      context : Option< PageContext >,
      /// Generation parameters.
      parameters : Option< ChatParameters >,
      /// Sender tab/client id, for rate limiting.
      client_id : String,
    },
    /// `cancel_stream`.
    CancelStream
    {
      /// The session to cancel.
      stream_id : String,
    },
  }

  /// One message from the kernel on the streaming port surface (spec §6.B);
  /// a thin re-export of the stream controller's own event enum so the port
  /// boundary and the internal state machine never drift apart.
  pub type PortEvent = crate::stream_controller::StreamEvent;
}

crate::mod_interface!
{
  exposed use
  {
    KernelRequest,
    KernelResponse,
    PortInbound,
    PortEvent,
  };
}

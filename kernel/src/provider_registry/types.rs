mod private
{
  use crate::error::Result;
  use async_trait::async_trait;
  use futures_core::stream::BoxStream;
  use secrecy::SecretString;

  /// One prior or current turn fed to a provider (spec §4.3).
  #[ derive( Debug, Clone ) ]
  pub struct ChatTurn
  {
    /// `"user"`, `"assistant"`, or `"system"`.
    pub role : String,
    /// Turn content.
    pub content : String,
  }

  /// The numeric generation parameters every provider accepts in some shape
  /// (spec §4.3). Fields a given provider doesn't support are simply dropped
  /// at encoding time.
  #[ derive( Debug, Clone, Default ) ]
  pub struct ChatParameters
  {
    /// Maximum tokens to generate.
    pub max_tokens : Option< u32 >,
    /// Sampling temperature.
    pub temperature : Option< f32 >,
    /// Nucleus sampling threshold.
    pub top_p : Option< f32 >,
    /// Frequency penalty (not supported by Anthropic).
    pub frequency_penalty : Option< f32 >,
    /// Presence penalty (not supported by Anthropic).
    pub presence_penalty : Option< f32 >,
    /// Stop sequences.
    pub stop_sequences : Vec< String >,
  }

  /// A uniform chat request handed to any `Provider` (spec §4.3). Callers
  /// build this once; each provider encodes it into its own wire shape.
  #[ derive( Debug, Clone ) ]
  pub struct ChatRequest
  {
    /// Model identifier, e.g. `"gpt-4o-mini"`, `"claude-3-haiku-20240307"`.
    pub model : String,
    /// System prompt; may be overridden by the caller.
    pub system_prompt : Option< String >,
    /// Prior turns, already capped to the last `history_window` by the
    /// dispatcher.
    pub prior_turns : Vec< ChatTurn >,
    /// The current user message, already sanitized by the policy gate.
    pub user_message : String,
    /// Generation parameters.
    pub parameters : ChatParameters,
  }

  /// Token usage reported by (or inferred for) a provider call.
  #[ derive( Debug, Clone, Copy, Default ) ]
  pub struct Usage
  {
    /// Input/prompt tokens.
    pub prompt_tokens : u64,
    /// Output/completion tokens.
    pub completion_tokens : u64,
  }

  impl Usage
  {
    /// Total tokens, the unit the per-model cost table prices against.
    #[ must_use ]
    pub fn total( &self ) -> u64
    {
      self.prompt_tokens + self.completion_tokens
    }

    /// The conservative default used when a provider omits usage accounting
    /// (spec §4.3).
    #[ must_use ]
    pub fn conservative_default() -> Self
    {
      Self { prompt_tokens : 0, completion_tokens : 1_000 }
    }
  }

  /// A completed, non-streamed provider reply.
  #[ derive( Debug, Clone ) ]
  pub struct ChatReply
  {
    /// Assistant content.
    pub content : String,
    /// Usage, if the provider reported it.
    pub usage : Usage,
    /// USD cost computed from `usage` and the model's cost table entry.
    pub cost : f64,
  }

  /// One incremental event from a streaming provider call. Provider-specific
  /// named SSE events are passed through as `Named`; the stream controller
  /// (§4.6) interprets them.
  #[ derive( Debug, Clone ) ]
  pub enum ProviderStreamEvent
  {
    /// An incremental content delta.
    ContentDelta( String ),
    /// A named, provider-specific event with no content of its own
    /// (e.g. Anthropic's `message_start`, `content_block_stop`).
    Named( String ),
    /// The stream reached its natural end; carries authoritative final
    /// content (if the provider sent one) and usage.
    Done
    {
      /// Authoritative final content, when the provider supplies one. When
      /// present it wins over the concatenation of deltas (spec §9).
      final_content : Option< String >,
      /// Usage for the completed response.
      usage : Usage,
      /// Provider-reported finish reason, if any.
      finish_reason : Option< String >,
    },
  }

  /// A boxed stream of provider events, the producer side of the polymorphic
  /// event stream the spec calls for in place of callback-based generators
  /// (§9 redesign flag).
  pub type ProviderEventStream = BoxStream< 'static, Result< ProviderStreamEvent > >;

  /// One provider behind the uniform contract (spec §4.3). New providers are
  /// added by implementing this trait and registering an instance — nothing
  /// that consumes a `dyn Provider` knows the concrete set (§9 redesign flag).
  #[ async_trait ]
  pub trait Provider : Send + Sync
  {
    /// Stable provider identifier, e.g. `"openai"`.
    fn id( &self ) -> &'static str;

    /// Whether this provider should handle `model`.
    fn accepts( &self, model : &str ) -> bool;

    /// The HTTPS origin this provider is reached at, for the policy gate's
    /// allow-list check.
    fn origin( &self ) -> &'static str;

    /// A single, non-streamed completion.
    async fn chat( &self, api_key : &SecretString, request : &ChatRequest ) -> Result< ChatReply >;

    /// A streamed completion.
    async fn stream( &self, api_key : &SecretString, request : &ChatRequest ) -> Result< ProviderEventStream >;

    /// Structural API-key format check for this provider.
    fn validate_key( &self, key : &str ) -> bool;
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn total_sums_prompt_and_completion_tokens()
    {
      let usage = Usage { prompt_tokens : 12, completion_tokens : 30 };
      assert_eq!( usage.total(), 42 );
    }

    #[ test ]
    fn conservative_default_assumes_a_large_completion()
    {
      let usage = Usage::conservative_default();
      assert_eq!( usage.prompt_tokens, 0 );
      assert_eq!( usage.completion_tokens, 1_000 );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    ChatTurn,
    ChatParameters,
    ChatRequest,
    Usage,
    ChatReply,
    ProviderStreamEvent,
    ProviderEventStream,
    Provider,
  };
}

mod private
{
  use crate::config::KernelConfig;
  use crate::error::{ KernelError, Result };
  use crate::provider_registry::anthropic::AnthropicProvider;
  use crate::provider_registry::deepseek::DeepSeekProvider;
  use crate::provider_registry::openai::OpenAiProvider;
  use crate::provider_registry::retry::retry_with_backoff;
  use crate::provider_registry::types::{ ChatReply, ChatRequest, Provider, ProviderEventStream };
  use secrecy::SecretString;
  use std::sync::Arc;

  /// Holds every known `Provider` and resolves which one handles a request by
  /// asking each `accepts(model)` in turn — never by branching on a model-name
  /// prefix in the dispatcher itself (§9 redesign flag). Adding a provider is
  /// "register an instance", not "add a match arm" anywhere downstream.
  pub struct ProviderRegistry
  {
    providers : Vec< Arc< dyn Provider > >,
    max_retry_attempts : u32,
    backoff_cap_ms : u64,
    backoff_jitter : f64,
  }

  impl ProviderRegistry
  {
    /// Builds the registry with the three built-in providers, each using
    /// `config.request_timeout_ms` for its HTTP client.
    #[ must_use ]
    pub fn new( config : &KernelConfig ) -> Self
    {
      let providers : Vec< Arc< dyn Provider > > = vec!
      [
        Arc::new( DeepSeekProvider::new( config.request_timeout_ms ) ),
        Arc::new( OpenAiProvider::new( config.request_timeout_ms ) ),
        Arc::new( AnthropicProvider::new( config.request_timeout_ms ) ),
      ];

      Self
      {
        providers,
        max_retry_attempts : config.max_retry_attempts,
        backoff_cap_ms : config.backoff_cap_ms,
        backoff_jitter : config.backoff_jitter,
      }
    }

    /// Builds a registry over an explicit provider set, bypassing the
    /// built-in three. Used to wire a test double (e.g. a provider pointed
    /// at a mock server via `with_base_url`) in place of the real DeepSeek/
    /// OpenAI/Anthropic instances.
    #[ must_use ]
    pub fn with_providers(
      providers : Vec< Arc< dyn Provider > >,
      max_retry_attempts : u32,
      backoff_cap_ms : u64,
      backoff_jitter : f64,
    ) -> Self
    {
      Self { providers, max_retry_attempts, backoff_cap_ms, backoff_jitter }
    }

    /// Resolves the provider that accepts `model`, if any.
    #[ must_use ]
    pub fn resolve( &self, model : &str ) -> Option< Arc< dyn Provider > >
    {
      self.providers.iter().find( | p | p.accepts( model ) ).cloned()
    }

    /// Returns the provider's stable id for `model`, for credential lookup.
    #[ must_use ]
    pub fn provider_id_for( &self, model : &str ) -> Option< &'static str >
    {
      self.resolve( model ).map( | p | p.id() )
    }

    /// A single, non-streamed completion, retried per spec §4.3.
    pub async fn chat( &self, model : &str, api_key : &SecretString, request : &ChatRequest ) -> Result< ChatReply >
    {
      let provider = self.resolve( model )
        .ok_or_else( || KernelError::Internal( format!( "no provider accepts model {model}" ) ) )?;

      retry_with_backoff( self.max_retry_attempts, self.backoff_cap_ms, self.backoff_jitter, ||
      {
        let provider = provider.clone();
        async move { provider.chat( api_key, request ).await }
      } ).await
    }

    /// A streamed completion. The connection attempt itself is retried the
    /// same way a one-shot call is; once a stream is established, the stream
    /// controller owns reconnection on mid-stream failure (spec §4.6).
    pub async fn stream( &self, model : &str, api_key : &SecretString, request : &ChatRequest ) -> Result< ProviderEventStream >
    {
      let provider = self.resolve( model )
        .ok_or_else( || KernelError::Internal( format!( "no provider accepts model {model}" ) ) )?;

      retry_with_backoff( self.max_retry_attempts, self.backoff_cap_ms, self.backoff_jitter, ||
      {
        let provider = provider.clone();
        async move { provider.stream( api_key, request ).await }
      } ).await
    }

    /// Structural API-key format validation for `provider_id`.
    #[ must_use ]
    pub fn validate_key( &self, provider_id : &str, key : &str ) -> bool
    {
      self.providers.iter()
        .find( | p | p.id() == provider_id )
        .is_some_and( | p | p.validate_key( key ) )
    }

    /// The allow-listed HTTPS origin for `provider_id`, for the policy gate.
    #[ must_use ]
    pub fn origin_for( &self, provider_id : &str ) -> Option< &'static str >
    {
      self.providers.iter().find( | p | p.id() == provider_id ).map( | p | p.origin() )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn resolves_each_known_model_family()
    {
      let registry = ProviderRegistry::new( &KernelConfig::default() );
      assert_eq!( registry.provider_id_for( "deepseek-chat" ), Some( "deepseek" ) );
      assert_eq!( registry.provider_id_for( "gpt-4o-mini" ), Some( "openai" ) );
      assert_eq!( registry.provider_id_for( "claude-3-haiku-20240307" ), Some( "anthropic" ) );
      assert_eq!( registry.provider_id_for( "unknown-model" ), None );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    ProviderRegistry,
  };
}

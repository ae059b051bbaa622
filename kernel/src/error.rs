mod private
{
  use error_tools::dependency::thiserror;

  /// The closed set of error kinds the kernel ever surfaces across its external
  /// interfaces (spec §7). Provider-layer and transport-layer failures are mapped
  /// into one of these variants at the boundary where they are caught; nothing
  /// upstream of the Provider Registry ever sees a raw `reqwest::Error`.
  #[ derive( Debug, Clone, PartialEq, thiserror::Error ) ]
  #[ non_exhaustive ]
  pub enum KernelError
  {
    /// Recoverable; includes the number of seconds the client must wait.
    #[ error( "Rate limit exceeded. Please wait {seconds} seconds before trying again." ) ]
    RateLimited
    {
      /// Seconds until the next request is admitted.
      seconds : u64,
    },

    /// Empty, oversize, or otherwise malformed message.
    #[ error( "Invalid input : {0}" ) ]
    InvalidInput( String ),

    /// No credential stored for the resolved provider.
    #[ error( "No {provider} API key configured. Add one in the extension options." ) ]
    CredentialMissing
    {
      /// The provider the caller tried to use.
      provider : String,
    },

    /// A stored credential failed format validation or was rejected by the provider.
    #[ error( "Invalid API key" ) ]
    CredentialInvalid,

    /// Provider returned HTTP 429 after internal retries were exhausted.
    #[ error( "Provider rate limit exceeded, retry in {retry_after_seconds:?}s" ) ]
    ProviderRateLimited
    {
      /// Provider-supplied `retry-after`, if present.
      retry_after_seconds : Option< u64 >,
    },

    /// Provider returned a 5xx status after internal retries were exhausted.
    #[ error( "Provider unavailable : {0}" ) ]
    ProviderUnavailable( String ),

    /// The outbound request exceeded its timeout budget.
    #[ error( "Transport timeout after {0} ms" ) ]
    TransportTimeout( u64 ),

    /// The resolved provider URL's origin is not on the allow-list. Not recoverable.
    #[ error( "Endpoint not allowed : {0}" ) ]
    EndpointNotAllowed( String ),

    /// The provider response could not be parsed as the expected shape.
    #[ error( "Response malformed : {0}" ) ]
    ResponseMalformed( String ),

    /// Persistent storage quota exceeded; eviction was triggered and the caller
    /// should retry once.
    #[ error( "Storage quota exceeded" ) ]
    StorageQuotaExceeded,

    /// The referenced conversation or message does not exist.
    #[ error( "Not found : {0}" ) ]
    StorageNotFound( String ),

    /// Terminal, but not an error from the user's point of view.
    #[ error( "Stream cancelled" ) ]
    StreamCancelled,

    /// Catch-all for conditions that don't fit another kind; never surfaced
    /// without an accompanying human-readable message.
    #[ error( "{0}" ) ]
    Internal( String ),
  }

  impl KernelError
  {
    /// Whether a caller could plausibly retry and succeed without changing
    /// anything (used by the stream controller's `error{recoverable}` field).
    #[ must_use ]
    pub fn recoverable( &self ) -> bool
    {
      !matches!(
        self,
        KernelError::EndpointNotAllowed( _ )
          | KernelError::ResponseMalformed( _ )
          | KernelError::CredentialInvalid
      )
    }

    /// The machine-readable kind string carried alongside the human-readable
    /// message in every `{error}` response (spec §7).
    #[ must_use ]
    pub fn kind( &self ) -> &'static str
    {
      match self
      {
        KernelError::RateLimited { .. } => "rate_limited",
        KernelError::InvalidInput( _ ) => "invalid_input",
        KernelError::CredentialMissing { .. } => "credential_missing",
        KernelError::CredentialInvalid => "credential_invalid",
        KernelError::ProviderRateLimited { .. } => "provider_rate_limited",
        KernelError::ProviderUnavailable( _ ) => "provider_unavailable",
        KernelError::TransportTimeout( _ ) => "transport_timeout",
        KernelError::EndpointNotAllowed( _ ) => "endpoint_not_allowed",
        KernelError::ResponseMalformed( _ ) => "response_malformed",
        KernelError::StorageQuotaExceeded => "storage_quota_exceeded",
        KernelError::StorageNotFound( _ ) => "storage_not_found",
        KernelError::StreamCancelled => "stream_cancelled",
        KernelError::Internal( _ ) => "internal",
      }
    }
  }

  /// Standard `Result` alias used throughout the kernel.
  pub type Result< T > = core::result::Result< T, KernelError >;

  #[ cfg( feature = "enabled" ) ]
  impl From< reqwest::Error > for KernelError
  {
    fn from( error : reqwest::Error ) -> Self
    {
      if error.is_timeout()
      {
        KernelError::TransportTimeout( 30_000 )
      }
      else if let Some( status ) = error.status()
      {
        if status.as_u16() == 429
        {
          KernelError::ProviderRateLimited { retry_after_seconds : None }
        }
        else if status.is_server_error()
        {
          KernelError::ProviderUnavailable( error.to_string() )
        }
        else if status.as_u16() == 401
        {
          KernelError::CredentialInvalid
        }
        else
        {
          KernelError::Internal( error.to_string() )
        }
      }
      else
      {
        KernelError::Internal( error.to_string() )
      }
    }
  }

  #[ cfg( feature = "enabled" ) ]
  impl From< serde_json::Error > for KernelError
  {
    fn from( error : serde_json::Error ) -> Self
    {
      KernelError::ResponseMalformed( error.to_string() )
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    KernelError,
    Result,
  };
}

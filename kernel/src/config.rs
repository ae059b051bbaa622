mod private
{
  /// Tunable constants for the kernel. Defaults match the fixed values the
  /// specification hardcodes; they are made overridable the way
  /// `api_claude::environment` and `api_openai::environment` expose per-crate
  /// configuration, rather than scattering magic numbers through the modules.
  #[ derive( Debug, Clone ) ]
  pub struct KernelConfig
  {
    /// Minimum gap, in milliseconds, between two admitted requests from the
    /// same client (policy gate).
    pub rate_limit_window_ms : u64,
    /// Age, in milliseconds, after which a rate-ledger entry is pruned.
    pub rate_ledger_max_age_ms : u64,
    /// Maximum accepted message length, in code points, after sanitization.
    pub max_message_chars : usize,
    /// Maximum accepted stored message length, in code points.
    pub max_stored_message_chars : usize,
    /// Maximum conversation title length, in characters.
    pub max_title_chars : usize,
    /// Number of prior turns loaded as context for a dispatch.
    pub history_window : usize,
    /// Maximum number of conversations retained before eviction kicks in.
    pub max_conversations : usize,
    /// Conversation LRU in-memory cache capacity.
    pub cache_capacity : usize,
    /// Eviction batch size.
    pub eviction_batch_size : usize,
    /// Archived conversations older than this many days become eviction
    /// candidates.
    pub archive_after_days : i64,
    /// Soft storage-quota threshold, as a fraction of available storage, above
    /// which writes trigger the eviction path.
    pub soft_quota_fraction : f64,
    /// Maximum provider-call attempts (1 initial + retries).
    pub max_retry_attempts : u32,
    /// Backoff cap, in milliseconds.
    pub backoff_cap_ms : u64,
    /// Jitter fraction applied to computed backoff delays.
    pub backoff_jitter : f64,
    /// Per non-stream provider call timeout, in milliseconds.
    pub request_timeout_ms : u64,
    /// Maximum stream reconnect attempts before giving up.
    pub max_reconnect_attempts : u32,
    /// PBKDF2 iteration count for credential key derivation.
    pub pbkdf2_iterations : u32,
  }

  impl Default for KernelConfig
  {
    fn default() -> Self
    {
      Self
      {
        rate_limit_window_ms : 10_000,
        rate_ledger_max_age_ms : 3_600_000,
        max_message_chars : 1_000,
        max_stored_message_chars : 100_000,
        max_title_chars : 200,
        history_window : 6,
        max_conversations : 1_000,
        cache_capacity : 50,
        eviction_batch_size : 50,
        archive_after_days : 30,
        soft_quota_fraction : 0.8,
        max_retry_attempts : 3,
        backoff_cap_ms : 30_000,
        backoff_jitter : 0.3,
        request_timeout_ms : 30_000,
        max_reconnect_attempts : 3,
        pbkdf2_iterations : 100_000,
      }
    }
  }

  fn env_override< T : std::str::FromStr >( var : &str, current : T ) -> T
  {
    match std::env::var( var )
    {
      Ok( raw ) => match raw.parse()
      {
        Ok( value ) => value,
        Err( _ ) =>
        {
          tracing::warn!( var, raw, "ignoring unparseable environment override" );
          current
        }
      },
      Err( _ ) => current,
    }
  }

  impl KernelConfig
  {
    /// Builds a config from [`KernelConfig::default`], overridden field-by-field
    /// by any `DEEPWEB_KERNEL_*` environment variable that's set and parses —
    /// the same direct `std::env::var` pattern `api_claude::environment` and
    /// `api_openai::environment` use to read their own secrets, rather than a
    /// deserialize-the-whole-struct crate.
    #[ must_use ]
    pub fn from_env() -> Self
    {
      let default = Self::default();
      Self
      {
        rate_limit_window_ms : env_override( "DEEPWEB_KERNEL_RATE_LIMIT_WINDOW_MS", default.rate_limit_window_ms ),
        rate_ledger_max_age_ms : env_override( "DEEPWEB_KERNEL_RATE_LEDGER_MAX_AGE_MS", default.rate_ledger_max_age_ms ),
        max_message_chars : env_override( "DEEPWEB_KERNEL_MAX_MESSAGE_CHARS", default.max_message_chars ),
        max_stored_message_chars : env_override( "DEEPWEB_KERNEL_MAX_STORED_MESSAGE_CHARS", default.max_stored_message_chars ),
        max_title_chars : env_override( "DEEPWEB_KERNEL_MAX_TITLE_CHARS", default.max_title_chars ),
        history_window : env_override( "DEEPWEB_KERNEL_HISTORY_WINDOW", default.history_window ),
        max_conversations : env_override( "DEEPWEB_KERNEL_MAX_CONVERSATIONS", default.max_conversations ),
        cache_capacity : env_override( "DEEPWEB_KERNEL_CACHE_CAPACITY", default.cache_capacity ),
        eviction_batch_size : env_override( "DEEPWEB_KERNEL_EVICTION_BATCH_SIZE", default.eviction_batch_size ),
        archive_after_days : env_override( "DEEPWEB_KERNEL_ARCHIVE_AFTER_DAYS", default.archive_after_days ),
        soft_quota_fraction : env_override( "DEEPWEB_KERNEL_SOFT_QUOTA_FRACTION", default.soft_quota_fraction ),
        max_retry_attempts : env_override( "DEEPWEB_KERNEL_MAX_RETRY_ATTEMPTS", default.max_retry_attempts ),
        backoff_cap_ms : env_override( "DEEPWEB_KERNEL_BACKOFF_CAP_MS", default.backoff_cap_ms ),
        backoff_jitter : env_override( "DEEPWEB_KERNEL_BACKOFF_JITTER", default.backoff_jitter ),
        request_timeout_ms : env_override( "DEEPWEB_KERNEL_REQUEST_TIMEOUT_MS", default.request_timeout_ms ),
        max_reconnect_attempts : env_override( "DEEPWEB_KERNEL_MAX_RECONNECT_ATTEMPTS", default.max_reconnect_attempts ),
        pbkdf2_iterations : env_override( "DEEPWEB_KERNEL_PBKDF2_ITERATIONS", default.pbkdf2_iterations ),
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn from_env_falls_back_to_defaults_when_nothing_is_set()
    {
      std::env::remove_var( "DEEPWEB_KERNEL_RATE_LIMIT_WINDOW_MS" );
      let config = KernelConfig::from_env();
      assert_eq!( config.rate_limit_window_ms, KernelConfig::default().rate_limit_window_ms );
    }

    #[ test ]
    fn from_env_applies_a_parseable_override()
    {
      std::env::set_var( "DEEPWEB_KERNEL_MAX_RETRY_ATTEMPTS", "7" );
      let config = KernelConfig::from_env();
      assert_eq!( config.max_retry_attempts, 7 );
      std::env::remove_var( "DEEPWEB_KERNEL_MAX_RETRY_ATTEMPTS" );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    KernelConfig,
  };
}
